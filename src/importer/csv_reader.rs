// ==========================================
// 多格式表格合并系统 - CSV 读取器
// ==========================================
// 编码: 按配置顺序逐个尝试，第一个能完整解码的编码胜出
// 表头: 第一行含非空白单元格的记录
// ==========================================

use crate::config::ProcessorConfig;
use crate::domain::format::FileFormat;
use crate::domain::table::{CellValue, SourceMetadata, SourceTable};
use crate::error::{MergeError, MergeResult};
use crate::importer::reader_trait::TableReader;
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// CsvEncoding - 可尝试的编码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvEncoding {
    /// 严格 UTF-8；带 BOM 的输入交给 Utf8Sig 处理
    Utf8,
    /// UTF-8，去掉开头 BOM
    Utf8Sig,
    /// encoding_rs 支持的其它编码（gbk / gb2312 / latin1 ...）
    Other(&'static Encoding),
}

impl CsvEncoding {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Some(CsvEncoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Some(CsvEncoding::Utf8Sig),
            other => Encoding::for_label(other.as_bytes()).map(CsvEncoding::Other),
        }
    }

    /// 解码，出现非法字节返回 None
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            CsvEncoding::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                std::str::from_utf8(bytes).ok().map(str::to_string)
            }
            CsvEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            CsvEncoding::Other(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

// ==========================================
// CsvReader
// ==========================================
pub struct CsvReader {
    encodings: Vec<String>,
}

impl CsvReader {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            encodings: config.csv_encodings.clone(),
        }
    }

    /// 从已解码文本构建表格
    fn parse_text(text: &str, path: &Path) -> MergeResult<(Vec<String>, Vec<Vec<CellValue>>, usize, Vec<usize>)> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let mut header: Option<(usize, Vec<String>)> = None;
        let mut rows = Vec::new();
        let mut positions = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // 跳过完全空白的行
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            match &header {
                None => {
                    header = Some((idx, record.iter().map(|c| c.trim().to_string()).collect()));
                }
                Some((_, cols)) => {
                    let mut row: Vec<CellValue> = record
                        .iter()
                        .take(cols.len())
                        .map(CellValue::text)
                        .collect();
                    row.resize(cols.len(), CellValue::text(""));
                    rows.push(row);
                    positions.push(idx);
                }
            }
        }

        let (header_row, header) =
            header.ok_or_else(|| MergeError::HeaderNotFound(path.display().to_string()))?;
        Ok((header, rows, header_row, positions))
    }
}

impl TableReader for CsvReader {
    fn read(&self, path: &Path) -> MergeResult<SourceTable> {
        let bytes = std::fs::read(path)?;
        let mut last_error = String::from("未配置任何编码");

        for label in &self.encodings {
            let Some(encoding) = CsvEncoding::from_label(label) else {
                last_error = format!("未知编码 {}", label);
                continue;
            };

            let Some(text) = encoding.decode(&bytes) else {
                tracing::debug!(file = %path.display(), encoding = %label, "编码解码失败，尝试下一个");
                last_error = format!("{} 解码失败", label);
                continue;
            };

            match Self::parse_text(&text, path) {
                Ok((header, rows, header_row, row_positions)) => {
                    tracing::debug!(
                        file = %path.display(),
                        encoding = %label,
                        columns = header.len(),
                        rows = rows.len(),
                        "CSV 读取完成"
                    );
                    let mut metadata = SourceMetadata::new(FileFormat::Csv);
                    metadata.encoding = Some(label.clone());
                    metadata.header_row = header_row;
                    metadata.row_positions = row_positions;
                    return Ok(SourceTable {
                        header,
                        rows,
                        metadata,
                    });
                }
                Err(e @ MergeError::HeaderNotFound(_)) => return Err(e),
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            }
        }

        Err(MergeError::CsvParseError(format!(
            "{}: 所有编码均读取失败 ({})",
            path.display(),
            last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn reader() -> CsvReader {
        CsvReader::new(&ProcessorConfig::default())
    }

    fn csv_file(bytes: &[u8]) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        temp_file.write_all(bytes).unwrap();
        temp_file
    }

    #[test]
    fn test_csv_reader_basic() {
        let file = csv_file("材料号,重量\nMAT001,2.5\nMAT002,3.0\n".as_bytes());
        let table = reader().read(file.path()).unwrap();

        assert_eq!(table.header, vec!["材料号", "重量"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], CellValue::text("MAT001"));
        assert_eq!(table.metadata.encoding.as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_csv_reader_skips_leading_blank_rows_and_pads() {
        let file = csv_file(b",,\n  id , name ,age\n1,Alice\n,,\n2,Bob,30,extra\n");
        let table = reader().read(file.path()).unwrap();

        assert_eq!(table.header, vec!["id", "name", "age"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[0],
            vec![CellValue::text("1"), CellValue::text("Alice"), CellValue::text("")]
        );
        assert_eq!(table.rows[1].len(), 3);
        assert_eq!(table.metadata.header_row, 1);
        assert_eq!(table.metadata.row_positions, vec![2, 4]);
    }

    #[test]
    fn test_csv_reader_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"id,name\n1,a\n");
        let file = csv_file(&bytes);
        let table = reader().read(file.path()).unwrap();

        assert_eq!(table.header[0], "id");
        assert_eq!(table.metadata.encoding.as_deref(), Some("utf-8-sig"));
    }

    #[test]
    fn test_csv_reader_gbk_fallback() {
        let (encoded, _, _) = encoding_rs::GBK.encode("姓名,城市\n张三,北京\n");
        let file = csv_file(&encoded);
        let table = reader().read(file.path()).unwrap();

        assert_eq!(table.header, vec!["姓名", "城市"]);
        assert_eq!(table.rows[0][1], CellValue::text("北京"));
        assert_eq!(table.metadata.encoding.as_deref(), Some("gbk"));
    }

    #[test]
    fn test_csv_reader_no_header() {
        let file = csv_file(b"  ,\n,\n");
        let err = reader().read(file.path()).unwrap_err();
        assert!(matches!(err, MergeError::HeaderNotFound(_)));
    }

    #[test]
    fn test_csv_reader_all_encodings_fail() {
        let config = ProcessorConfig {
            csv_encodings: vec!["utf-8".to_string()],
            ..Default::default()
        };
        let file = csv_file(&[0xff, 0xfe, 0x00, b'a']);
        let err = CsvReader::new(&config).read(file.path()).unwrap_err();
        assert!(matches!(err, MergeError::CsvParseError(_)));
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(CsvEncoding::from_label("UTF-8"), Some(CsvEncoding::Utf8));
        assert!(matches!(CsvEncoding::from_label("gb2312"), Some(CsvEncoding::Other(_))));
        assert!(matches!(CsvEncoding::from_label("latin1"), Some(CsvEncoding::Other(_))));
        assert_eq!(CsvEncoding::from_label("no-such-encoding"), None);
    }
}
