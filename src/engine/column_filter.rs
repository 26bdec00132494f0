// ==========================================
// 多格式表格合并系统 - 列过滤
// ==========================================
// keep: 只保留列表中的列；remove: 去掉列表中的列
// 两种模式都保持原表头顺序；图片随列重映射
// ==========================================

use crate::domain::table::Table;
use crate::domain::task::FilterMode;

pub struct ColumnFilter;

impl ColumnFilter {
    /// 模式为 none 或列清单为空时不做任何修改
    pub fn apply(&self, table: &mut Table, mode: FilterMode, columns: &[String]) {
        if mode == FilterMode::None || columns.is_empty() {
            return;
        }

        let listed = |name: &String| columns.iter().any(|c| c == name);
        let kept: Vec<usize> = table
            .header
            .iter()
            .enumerate()
            .filter(|(_, name)| match mode {
                FilterMode::Keep => listed(name),
                FilterMode::Remove => !listed(name),
                FilterMode::None => true,
            })
            .map(|(idx, _)| idx)
            .collect();

        if kept.len() == table.header.len() {
            return;
        }

        // 旧列号 → 新列号
        let mut remap: Vec<Option<usize>> = vec![None; table.header.len()];
        for (new_idx, &old_idx) in kept.iter().enumerate() {
            remap[old_idx] = Some(new_idx);
        }

        table.header = kept.iter().map(|&i| table.header[i].clone()).collect();
        for row in table.rows.iter_mut() {
            let filtered = kept.iter().map(|&i| row.get(i).cloned().unwrap_or_default()).collect();
            *row = filtered;
        }

        let before = table.images.len();
        table.images.retain_mut(|image| match remap.get(image.col).copied().flatten() {
            Some(col) => {
                image.col = col;
                true
            }
            None => false,
        });

        tracing::info!(
            mode = ?mode,
            columns = table.header.len(),
            images_dropped = before - table.images.len(),
            "列过滤完成"
        );
    }
}
