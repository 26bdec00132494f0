// ==========================================
// 图片合并集成测试
// ==========================================
// 测试目标: xlsx 图片随数据行迁移到合并表，并在导出时重新嵌入
// ==========================================


use calamine::{open_workbook, Data, Reader, Xlsx};
use table_merger::importer::ImageExtractor;
use table_merger::{
    logging, CellValue, FileFormat, FileWriter, ProcessorConfig, TableMerger, TableReader,
    UniversalReader, WriterCapabilities,
};
use test_helpers::{write_csv, write_xlsx};

#[test]
fn test_extractor_reads_anchor_and_size() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = write_xlsx(
        dir.path(),
        "photos.xlsx",
        &[&["id", "photo"], &["1", ""]],
        &[(1, 1, 80, 60)],
    )
    .unwrap();

    let anchors = ImageExtractor::new(&ProcessorConfig::default()).extract(&path);
    assert_eq!(anchors.len(), 1);
    assert_eq!((anchors[0].row, anchors[0].col), (1, 1));
    assert_eq!((anchors[0].width, anchors[0].height), (80, 60));
    assert!(anchors[0].data.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_image_in_second_file_lands_on_its_merged_row() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let first = write_csv(dir.path(), "a.csv", "id,name\n1,a\n2,b\n");
    // 第 0 行为标题，第 1 行为表头，图片锚定在第 3 行（id=4 的数据行）
    let second = write_xlsx(
        dir.path(),
        "b.xlsx",
        &[
            &["二月名单"],
            &["id", "name", "照片"],
            &["3", "c", "图片占位"],
            &["4", "d", ""],
        ],
        &[(3, 2, 80, 60)],
    )
    .unwrap();

    let reader = UniversalReader::new(&ProcessorConfig::default());
    let table = TableMerger::new(&reader).merge(&[first, second]).unwrap();

    assert_eq!(table.header, vec!["id", "name", "照片"]);
    assert_eq!(table.rows.len(), 4);
    assert_eq!(table.images.len(), 1);
    let image = &table.images[0];
    assert_eq!((image.row, image.col), (3, 2));
    assert_eq!(table.cell(3, 0), &CellValue::Int(4));
    // 图片列的文本内容被清空
    assert_eq!(table.cell(2, 2), &CellValue::Null);
    assert_eq!(table.cell(3, 2), &CellValue::Null);
}

#[test]
fn test_images_survive_xlsx_export() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let source = write_xlsx(
        dir.path(),
        "src.xlsx",
        &[&["id", "photo"], &["1", ""], &["2", ""]],
        &[(2, 1, 40, 40)],
    )
    .unwrap();

    let config = ProcessorConfig::default();
    let reader = UniversalReader::new(&config);
    let table = TableMerger::new(&reader).merge(&[source]).unwrap();
    assert_eq!(table.images[0].row, 1);

    let out = dir.path().join("out.xlsx");
    FileWriter::new(&config, WriterCapabilities::detect())
        .write(&table, &out, FileFormat::Xlsx)
        .unwrap();

    let reread = reader.read(&out).unwrap();
    assert_eq!(reread.metadata.images.len(), 1);
    assert_eq!((reread.metadata.images[0].row, reread.metadata.images[0].col), (2, 1));

    let mut workbook: Xlsx<_> = open_workbook(&out).unwrap();
    let range = workbook.worksheet_range("Merged").unwrap();
    assert_eq!(range.get_value((2, 0)), Some(&Data::Float(2.0)));
}
