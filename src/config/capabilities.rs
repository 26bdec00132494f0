// ==========================================
// 多格式表格合并系统 - 导出能力检测
// ==========================================
// 进程启动时检测一次，作为配置传入导出器
// ==========================================

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriterCapabilities {
    /// 是否可写 .xls（编译特性 legacy-xls）
    pub legacy_xls: bool,
}

impl WriterCapabilities {
    pub fn detect() -> Self {
        let caps = Self {
            legacy_xls: cfg!(feature = "legacy-xls"),
        };
        tracing::debug!(legacy_xls = caps.legacy_xls, "导出能力检测完成");
        caps
    }

    /// 全部能力关闭（测试缺失依赖路径用）
    pub fn minimal() -> Self {
        Self { legacy_xls: false }
    }
}

impl Default for WriterCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}
