// ==========================================
// 多格式表格合并系统 - 合并引擎
// ==========================================
// 表头: 按首次出现顺序取并集（大小写敏感，空列名不参与）
// 数据: 各文件按列名重排后纵向拼接，不按键关联
// 图片: 按锚点所在数据行换算到合并表行号，对应单元格置空
// ==========================================

use crate::domain::table::{CellValue, PlacedImage, SourceTable, Table};
use crate::error::{MergeError, MergeResult};
use crate::importer::reader_trait::TableReader;
use std::path::Path;
use tracing::instrument;

pub struct TableMerger<R: TableReader> {
    reader: R,
}

impl<R: TableReader> TableMerger<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// 依次读取并合并所有文件
    ///
    /// # 返回
    /// - Ok(Table): 合并后的表（含重新定位的图片）
    /// - Err: 任一文件读取失败即整体失败
    #[instrument(skip(self, paths), fields(files = paths.len()))]
    pub fn merge<P: AsRef<Path>>(&self, paths: &[P]) -> MergeResult<Table> {
        if paths.is_empty() {
            return Err(MergeError::NoInputFiles);
        }

        let mut table = Table::default();
        for path in paths {
            let path = path.as_ref();
            let source = self.reader.read(path)?;
            tracing::info!(
                file = %path.display(),
                format = %source.metadata.format,
                columns = source.header.len(),
                rows = source.rows.len(),
                "文件读取完成"
            );
            append_source(&mut table, source);
        }

        tracing::info!(
            columns = table.header.len(),
            rows = table.rows.len(),
            images = table.images.len(),
            "合并完成"
        );
        Ok(table)
    }
}

/// 把单个文件并入合并表
pub fn append_source(table: &mut Table, source: SourceTable) {
    let SourceTable {
        header,
        rows,
        metadata,
    } = source;

    // 1. 表头并集，已有行补空
    let before = table.header.len();
    for name in &header {
        if !name.is_empty() && !table.header.iter().any(|h| h == name) {
            table.header.push(name.clone());
        }
    }
    if table.header.len() > before {
        table.pad_rows();
    }

    // 2. 源列 → 合并列
    let index_map: Vec<Option<usize>> = header
        .iter()
        .map(|name| {
            if name.is_empty() {
                None
            } else {
                table.column_index(name)
            }
        })
        .collect();

    // 3. 重排数据行
    let width = table.header.len();
    let row_offset = table.rows.len();
    for row in rows {
        let mut merged = vec![CellValue::Null; width];
        for (src_col, cell) in row.into_iter().enumerate() {
            if let Some(Some(dst_col)) = index_map.get(src_col) {
                merged[*dst_col] = cell;
            }
        }
        table.rows.push(merged);
    }

    // 4. 图片定位
    for anchor in metadata.images {
        let Some(data_idx) = metadata
            .row_positions
            .iter()
            .position(|&pos| pos == anchor.row)
        else {
            tracing::warn!(
                row = anchor.row,
                col = anchor.col,
                header_row = metadata.header_row,
                "图片锚点不在数据行上，已丢弃"
            );
            continue;
        };
        let Some(col) = index_map.get(anchor.col).copied().flatten() else {
            tracing::warn!(row = anchor.row, col = anchor.col, "图片所在列未映射，已丢弃");
            continue;
        };

        let row = row_offset + data_idx;
        table.set_cell(row, col, CellValue::Null);
        table.images.push(PlacedImage {
            data: anchor.data,
            row,
            col,
            width: anchor.width,
            height: anchor.height,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::format::FileFormat;
    use crate::domain::table::{ImageAnchor, SourceMetadata};
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct StubReader {
        sources: HashMap<PathBuf, SourceTable>,
    }

    impl TableReader for StubReader {
        fn read(&self, path: &Path) -> MergeResult<SourceTable> {
            self.sources
                .get(path)
                .cloned()
                .ok_or_else(|| MergeError::FileNotFound(path.display().to_string()))
        }
    }

    fn text_rows(rows: &[&[&str]]) -> Vec<Vec<CellValue>> {
        rows.iter()
            .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
            .collect()
    }

    fn source(header: &[&str], rows: &[&[&str]]) -> SourceTable {
        let rows = text_rows(rows);
        let mut metadata = SourceMetadata::new(FileFormat::Csv);
        metadata.row_positions = (1..=rows.len()).collect();
        SourceTable {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
            metadata,
        }
    }

    fn merger(sources: Vec<(&str, SourceTable)>) -> TableMerger<StubReader> {
        TableMerger::new(StubReader {
            sources: sources
                .into_iter()
                .map(|(p, s)| (PathBuf::from(p), s))
                .collect(),
        })
    }

    #[test]
    fn test_merge_concatenates_rows_not_join() {
        let m = merger(vec![
            ("a.csv", source(&["id", "name"], &[&["1", "Alice"]])),
            ("b.csv", source(&["id", "age"], &[&["1", "30"]])),
        ]);
        let table = m.merge(&["a.csv", "b.csv"]).unwrap();

        assert_eq!(table.header, vec!["id", "name", "age"]);
        assert_eq!(
            table.rows,
            vec![
                vec![CellValue::text("1"), CellValue::text("Alice"), CellValue::Null],
                vec![CellValue::text("1"), CellValue::Null, CellValue::text("30")],
            ]
        );
    }

    #[test]
    fn test_merge_skips_blank_column_names() {
        let m = merger(vec![
            ("a.csv", source(&["x", "", "y"], &[&["1", "drop", "2"]])),
            ("b.csv", source(&["y", "z", "x"], &[&["3", "4", "5"]])),
        ]);
        let table = m.merge(&["a.csv", "b.csv"]).unwrap();

        assert_eq!(table.header, vec!["x", "y", "z"]);
        assert!(table.rows.iter().all(|r| r.len() == table.header.len()));
        assert_eq!(table.rows[0], vec![CellValue::text("1"), CellValue::text("2"), CellValue::Null]);
        assert_eq!(table.rows[1], text_rows(&[&["5", "3", "4"]])[0]);
    }

    #[test]
    fn test_merge_no_input_files() {
        let m = merger(vec![]);
        let paths: Vec<PathBuf> = Vec::new();
        assert!(matches!(m.merge(&paths), Err(MergeError::NoInputFiles)));
    }

    #[test]
    fn test_merge_propagates_read_failure() {
        let m = merger(vec![("a.csv", source(&["id"], &[&["1"]]))]);
        assert!(matches!(
            m.merge(&["a.csv", "missing.csv"]),
            Err(MergeError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_merge_places_image_from_second_file() {
        let first = source(&["id", "name"], &[&["1", "a"], &["2", "b"]]);

        // 第 0 行标题，第 1 行表头，第 2-4 行数据，第 3 行为空行已跳过
        let mut second = source(&["id", "name", "photo"], &[&["3", "c", ""], &["4", "d", ""]]);
        second.metadata.format = FileFormat::Xlsx;
        second.metadata.header_row = 1;
        second.metadata.row_positions = vec![2, 4];
        second.metadata.images = vec![
            ImageAnchor {
                data: vec![1, 2, 3],
                row: 4,
                col: 2,
                width: 80,
                height: 60,
            },
            ImageAnchor {
                data: vec![9],
                row: 1,
                col: 2,
                width: 100,
                height: 100,
            },
        ];

        let m = merger(vec![("a.csv", first), ("b.xlsx", second)]);
        let table = m.merge(&["a.csv", "b.xlsx"]).unwrap();

        assert_eq!(table.header, vec!["id", "name", "photo"]);
        assert_eq!(table.images.len(), 1);
        let image = &table.images[0];
        assert_eq!((image.row, image.col), (3, 2));
        assert_eq!((image.width, image.height), (80, 60));
        assert_eq!(table.cell(3, 0), &CellValue::text("4"));
        assert_eq!(table.cell(3, 2), &CellValue::Null);
    }

    #[test]
    fn test_merge_drops_image_in_unmapped_column() {
        let mut only = source(&["id", ""], &[&["1", "x"]]);
        only.metadata.images = vec![ImageAnchor {
            data: vec![1],
            row: 1,
            col: 1,
            width: 100,
            height: 100,
        }];
        let m = merger(vec![("a.xlsx", only)]);
        let table = m.merge(&["a.xlsx"]).unwrap();
        assert!(table.images.is_empty());
    }
}
