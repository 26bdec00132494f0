// ==========================================
// 合并管道集成测试
// ==========================================
// 测试目标: 多文件合并 + 规则处理 + 导出的完整流程
// ==========================================


use serde_json::json;
use table_merger::domain::{
    CellOperationRecord, CleaningRuleRecord, DerivationRuleRecord, ValidationRuleRecord,
};
use table_merger::domain::rules::{ExtractionRecord, MappingRecord};
use table_merger::{
    logging, CellValue, FileFormat, MergeError, MergeOrchestrator, MergeTask, ProcessorConfig,
    TableMerger, TableReader, UniversalReader, WriterCapabilities,
};
use test_helpers::{write_csv, write_json, write_xlsx};

fn orchestrator(output_dir: &std::path::Path) -> MergeOrchestrator {
    let config = ProcessorConfig {
        output_dir: output_dir.to_path_buf(),
        ..ProcessorConfig::default()
    };
    MergeOrchestrator::new(config, WriterCapabilities::detect())
}

#[test]
fn test_rows_are_concatenated_not_joined() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let a = write_csv(dir.path(), "a.csv", "id,name\n1,Alice\n");
    let b = write_csv(dir.path(), "b.csv", "id,age\n1,30\n");

    let reader = UniversalReader::new(&ProcessorConfig::default());
    let table = TableMerger::new(&reader).merge(&[a, b]).unwrap();

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
fn test_mixed_formats_merge_into_rectangular_table() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path(), "a.csv", "编号,姓名\n1,张三\n");
    let json = write_json(
        dir.path(),
        "b.json",
        &json!({"data": [{"编号": 2, "姓名": "李四", "城市": "上海"}, {"编号": 3}]}),
    );
    let xlsx = write_xlsx(
        dir.path(),
        "c.xlsx",
        &[&["编号", "部门"], &["4", "研发"]],
        &[],
    )
    .unwrap();

    let reader = UniversalReader::new(&ProcessorConfig::default());
    let table = TableMerger::new(&reader).merge(&[csv, json, xlsx]).unwrap();

    assert_eq!(table.header, vec!["编号", "姓名", "城市", "部门"]);
    assert_eq!(table.rows.len(), 4);
    assert!(table.rows.iter().all(|r| r.len() == table.header.len()));
    assert_eq!(table.rows[1][1], CellValue::text("李四"));
    assert_eq!(table.rows[1][2], CellValue::text("上海"));
    // 缺失的键按空串读取
    assert_eq!(table.rows[2][1], CellValue::text(""));
    assert_eq!(table.rows[0][2], CellValue::Null);
    assert_eq!(table.rows[3][0], CellValue::Int(4));
    assert_eq!(table.rows[3][3], CellValue::text("研发"));
}

#[test]
fn test_full_pipeline_to_json() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let a = write_csv(
        dir.path(),
        "a.csv",
        "code,name,qty\nBJ-01, alice ,3\nSH-02,bob,\nBJ-01, alice ,3\n",
    );
    let b = write_csv(dir.path(), "b.csv", "code,qty,note\nGZ-03,5,x\n");

    let task = MergeTask {
        task_id: Some("pipeline".into()),
        files: vec![a, b],
        output_format: "json".into(),
        filter_mode: "remove".into(),
        filter_columns: vec!["note".into()],
        cleaning_rules: vec![
            CleaningRuleRecord {
                action: "remove_duplicates".into(),
                order: 0,
                ..CleaningRuleRecord::default()
            },
            CleaningRuleRecord {
                action: "trim_spaces".into(),
                columns: vec!["name".into()],
                order: 1,
                ..CleaningRuleRecord::default()
            },
            CleaningRuleRecord {
                action: "fill_null".into(),
                columns: vec!["qty".into()],
                parameters: json!({"method": "value", "value": "0"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                order: 2,
            },
            CleaningRuleRecord {
                action: "convert_type".into(),
                columns: vec!["qty".into()],
                parameters: json!({"type": "integer"}).as_object().cloned().unwrap(),
                order: 3,
            },
        ],
        validation_rules: vec![ValidationRuleRecord {
            column: "name".into(),
            rule_type: "required".into(),
            ..ValidationRuleRecord::default()
        }],
        column_rule: Some(DerivationRuleRecord {
            source_column: "code".into(),
            new_column: "city".into(),
            extraction: Some(ExtractionRecord {
                start: 1,
                end: Some(2),
                one_indexed: true,
            }),
            mappings: vec![
                MappingRecord {
                    pattern: "BJ".into(),
                    value: "北京".into(),
                    regex: false,
                },
                MappingRecord {
                    pattern: "^S".into(),
                    value: "上海".into(),
                    regex: true,
                },
            ],
        }),
        cell_operations: vec![CellOperationRecord {
            column: "name".into(),
            action: "uppercase_first".into(),
            ..CellOperationRecord::default()
        }],
        ..MergeTask::default()
    };

    // 未知单元格操作在编译阶段报错
    let err = orchestrator(dir.path()).run(&task).unwrap_err();
    assert!(matches!(err, MergeError::InvalidRule { .. }));

    let task = MergeTask {
        cell_operations: vec![CellOperationRecord {
            column: "name".into(),
            action: "add_prefix".into(),
            value: Some("user:".into()),
            ..CellOperationRecord::default()
        }],
        ..task
    };
    let output = orchestrator(dir.path()).run(&task).unwrap();

    assert_eq!(output.output_format, FileFormat::Json);
    assert_eq!(output.cleaning.rows_removed, 1);
    let validation = output.validation.as_ref().unwrap();
    assert_eq!(validation.errors.len(), 1);
    assert_eq!(validation.errors[0].row, 3);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output.output_path).unwrap()).unwrap();
    assert_eq!(written["columns"], json!(["code", "name", "qty", "city"]));
    assert_eq!(written["count"], json!(3));
    assert_eq!(
        written["data"][0],
        json!({"code": "BJ-01", "name": "user:alice", "qty": 3, "city": "北京"})
    );
    assert_eq!(
        written["data"][1],
        json!({"code": "SH-02", "name": "user:bob", "qty": 0, "city": "上海"})
    );
    assert_eq!(
        written["data"][2],
        json!({"code": "GZ-03", "name": "", "qty": 5, "city": "GZ"})
    );
}

#[test]
fn test_format_error_fails_whole_task() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let good = write_csv(dir.path(), "a.csv", "id\n1\n");
    let bad = write_json(dir.path(), "b.json", &json!({"unexpected": true}));

    let task = MergeTask {
        files: vec![good, bad],
        output_format: "csv".into(),
        ..MergeTask::default()
    };
    let err = orchestrator(dir.path()).run(&task).unwrap_err();
    assert!(matches!(err, MergeError::JsonParseError(_)));
}

#[test]
fn test_unsupported_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(dir.path(), "a.csv", "id\n1\n");
    let task = MergeTask {
        files: vec![input],
        output_format: "pdf".into(),
        ..MergeTask::default()
    };
    let err = orchestrator(dir.path()).run(&task).unwrap_err();
    assert!(matches!(err, MergeError::UnsupportedFormat(_)));
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let reader = UniversalReader::new(&ProcessorConfig::default());
    let err = reader.read(&dir.path().join("ghost.csv")).unwrap_err();
    assert!(matches!(err, MergeError::FileNotFound(_)));
}
