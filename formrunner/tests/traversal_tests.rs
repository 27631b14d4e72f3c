mod common;

use common::{document, fill, interpreter, Call, RecordingActuator, ScriptedOracle};
use formrunner::{
    clean_appointment_number, clean_total_amount, DocumentStore, JsonWorkbookStore,
    SubsequenceMode,
};

#[tokio::test]
async fn first_kind_resumes_on_the_end_row() {
    let doc = document(&[
        &["子序列开始", "姓名", "子序列结束", "提交"],
        &["是", "张三", "", ""],
        &["", "李四", "", ""],
        &["", "王五", "是", "$点击"],
        &["", "赵六", "", ""],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name"), ("提交", "submit")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![
            fill("name", "张三"),
            fill("name", "李四"),
            fill("name", "王五"),
            Call::Click("submit".into()),
            fill("name", "赵六"),
        ]
    );
    assert_eq!(report.subsequences.len(), 1);
    assert_eq!(report.subsequences[0].start_row, 1);
    assert_eq!(report.subsequences[0].end_row, Some(3));
    assert_eq!(report.subsequences[0].iterations, 3);
    assert_eq!(report.rows_visited, 4);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn second_kind_resolves_indexed_titles() {
    let doc = document(&[
        &["子序列开始", "姓名", "子序列结束"],
        &["1", "甲", ""],
        &["", "乙", ""],
        &["", "丙", "1"],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名-0", "n0"), ("姓名-1", "n1"), ("姓名-2", "n2"), ("姓名", "plain")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![fill("n0", "甲"), fill("n1", "乙"), fill("n2", "丙")]
    );
    assert_eq!(report.subsequences[0].kind, SubsequenceMode::Second);
    assert_eq!(runner.state().subsequence_mode, SubsequenceMode::None);
    assert_eq!(runner.state().subsequence_index, 0);
}

#[tokio::test]
async fn missing_end_marker_stops_traversal() {
    let doc = document(&[
        &["子序列开始", "姓名", "子序列结束", "提交"],
        &["是", "A", "", "$点击"],
        &["", "B", "否", "$点击"],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name"), ("提交", "submit")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(actuator.calls(), vec![fill("name", "A"), fill("name", "B")]);
    assert_eq!(report.subsequences[0].end_row, None);
    assert_eq!(report.rows_visited, 2);
}

#[tokio::test]
async fn adjacent_subsequences_chain_on_one_row() {
    let doc = document(&[
        &["子序列开始", "a", "子序列结束", "子序列开始", "b", "子序列结束", "c"],
        &["是", "a1", "是", "1", "b1", "", "c1"],
        &["", "a2", "", "", "b2", "1", "c2"],
        &["", "a3", "", "", "", "", "c3"],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("a", "ida"), ("b-0", "idb0"), ("b-1", "idb1"), ("c", "idc")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![
            fill("ida", "a1"),
            fill("idb0", "b1"),
            fill("idb1", "b2"),
            fill("idc", "c2"),
            fill("ida", "a3"),
            fill("idc", "c3"),
        ]
    );
    let kinds: Vec<_> = report.subsequences.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SubsequenceMode::First, SubsequenceMode::Second]);
    assert_eq!(report.subsequences[1].start_col, 3);
    assert_eq!(report.subsequences[1].end_row, Some(2));
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn nested_start_sentinel_is_inert() {
    let doc = document(&[
        &["子序列开始", "a", "子序列开始", "b", "子序列结束"],
        &["是", "a1", "1", "b1", "是"],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("a", "ida"), ("b", "idb")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(actuator.calls(), vec![fill("ida", "a1"), fill("idb", "b1")]);
    assert_eq!(report.subsequences.len(), 1);
}

#[tokio::test]
async fn unrecognised_marker_does_not_jump() {
    let doc = document(&[
        &["子序列开始", "姓名", "子序列结束"],
        &["否", "A", ""],
        &["", "B", ""],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(actuator.calls(), vec![fill("name", "A"), fill("name", "B")]);
    assert!(report.subsequences.is_empty());
}

#[tokio::test]
async fn computed_columns_fill_even_when_empty() {
    let doc = document(&[&["备注", "%文件路径", "%生成时间", "%备用"], &["", "", "", ""]]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(doc, &[], actuator.clone(), ScriptedOracle::returning("1", "1"));

    let report = runner.run().await;

    assert!(actuator.calls().is_empty());
    let doc = runner.document();
    assert_eq!(doc.cell(1, 1), "未生成");
    assert_eq!(doc.cell(1, 2).len(), "2024-01-01 00:00:00".len());
    assert_eq!(doc.cell(1, 3), "");
    assert_eq!(report.writes.len(), 2);
}

#[tokio::test]
async fn subject_then_amount_clears_pending_subject() {
    let doc = document(&[&["科目", "金额"], &["#旅费", "100"]]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("旅费", "subject_travel")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![Call::SubjectAmount("subject_travel".into(), "100".into())]
    );
    assert_eq!(runner.state().pending_subject_id, None);
}

#[tokio::test]
async fn failed_amount_still_clears_pending_subject() {
    let doc = document(&[&["科目", "金额", "金额"], &["#旅费", "100", "200"]]);
    let actuator = RecordingActuator::failing_on(&["subject_travel"]);
    let mut runner = interpreter(
        doc,
        &[("旅费", "subject_travel"), ("金额", "amount_box")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    // the second amount no longer has a pending subject and is a plain input
    assert_eq!(
        actuator.calls(),
        vec![
            Call::SubjectAmount("subject_travel".into(), "100".into()),
            fill("amount_box", "200"),
        ]
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].command, "amount_input");
    assert_eq!(runner.state().pending_subject_id, None);
}

#[tokio::test]
async fn dropdown_values_are_encoded() {
    let doc = document(&[&["支付方式"], &["个人转卡"]]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("支付方式", "pay_type")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![Call::Dropdown("pay_type".into(), "10".into())]
    );
}

#[tokio::test]
async fn per_cell_errors_do_not_stop_the_run() {
    let doc = document(&[
        &["等待", "未知字段", "出发日期", "回车"],
        &["soon", "x", "2024-02-30", "$点击"],
        &["0", "", "2024-02-29", ""],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("出发日期", "depart")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![
            Call::Enter,
            Call::Wait(0.0),
            Call::Date("depart".into(), "2024-02-29".into()),
        ]
    );
    let cells: Vec<_> = report.failures.iter().map(|f| f.cell.as_str()).collect();
    assert_eq!(cells, vec!["A2", "B2", "C2"]);
}

#[tokio::test]
async fn oversized_wait_is_a_cell_failure() {
    let doc = document(&[&["等待", "姓名"], &["1e20", "x"]]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(actuator.calls(), vec![fill("name", "x")]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].cell, "A2");
    assert_eq!(report.rows_visited, 1);
}

#[tokio::test]
async fn start_without_end_column_runs_to_the_last_row() {
    let doc = document(&[
        &["子序列开始", "姓名", "提交"],
        &["是", "A", "$点击"],
        &["", "B", ""],
        &["", "C", "$点击"],
    ]);
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name"), ("提交", "submit")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );

    let report = runner.run().await;

    assert_eq!(
        actuator.calls(),
        vec![
            fill("name", "A"),
            Call::Click("submit".into()),
            fill("name", "B"),
            fill("name", "C"),
            Call::Click("submit".into()),
        ]
    );
    assert_eq!(report.subsequences.len(), 1);
    assert_eq!(report.subsequences[0].end_row, None);
    assert_eq!(report.subsequences[0].iterations, 3);
    assert_eq!(report.rows_visited, 3);
    assert_eq!(runner.state().subsequence_mode, SubsequenceMode::None);
}

#[tokio::test]
async fn print_confirmation_records_artifact_once() {
    let doc = document(&[
        &["打印确认单按钮", "%文件路径", "%预约号", "%金额", "%文件名"],
        &["$点击", "", "", "", ""],
        &["$点击", "", "", "", ""],
    ]);
    let actuator = RecordingActuator::new();
    let oracle = ScriptedOracle::returning(" 2024001\n", "1,234.5");
    let mut runner = interpreter(
        doc,
        &[("打印确认单按钮", "print_btn")],
        actuator.clone(),
        oracle.clone(),
    );

    let report = runner.run().await;

    assert_eq!(oracle.extraction_count(), 1);
    assert_eq!(
        actuator.calls(),
        vec![Call::Click("print_btn".into()), Call::Click("print_btn".into())]
    );
    let doc = runner.document();
    let path = doc.cell(1, 1).to_string();
    assert!(path.starts_with("/tmp/formrunner-artifacts/2024001-1234.50-"));
    assert!(path.ends_with(".pdf"));
    assert_eq!(doc.cell(1, 2), "2024001");
    assert_eq!(doc.cell(1, 3), "1234.50");
    assert!(path.ends_with(doc.cell(1, 4)));
    assert_eq!(doc.cell(2, 1), path);
    assert_eq!(report.artifact_path.as_deref(), Some(path.as_str()));
}

#[tokio::test]
async fn print_confirmation_survives_click_and_oracle_failures() {
    let doc = document(&[&["打印按钮", "%预约号", "%金额"], &["$点击", "", ""]]);
    let actuator = RecordingActuator::failing_on(&["print"]);
    let mut runner = interpreter(
        doc,
        &[("打印按钮", "print")],
        actuator.clone(),
        ScriptedOracle::broken(),
    );

    let report = runner.run().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(runner.document().cell(1, 1), "null");
    assert_eq!(runner.document().cell(1, 2), "0.00");
}

#[tokio::test]
async fn computed_values_survive_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("报销信息.json");
    std::fs::write(
        &path,
        r#"{"sheets": {"BaoXiao_sheet": [["姓名", "%文件路径"], ["张三", null]], "Other": [["x"]]}}"#,
    )
    .unwrap();

    let store = JsonWorkbookStore;
    let doc = store.load(&path, "BaoXiao_sheet").unwrap();
    let actuator = RecordingActuator::new();
    let mut runner = interpreter(
        doc,
        &[("姓名", "name")],
        actuator.clone(),
        ScriptedOracle::returning("1", "1"),
    );
    runner.run().await;
    store.save(&path, &runner.into_document()).unwrap();

    let reloaded = store.load(&path, "BaoXiao_sheet").unwrap();
    assert_eq!(reloaded.cell(1, 1), "未生成");
    assert!(store.load(&path, "Other").is_ok());
}

#[test]
fn artifact_value_cleaning() {
    assert_eq!(clean_total_amount("1,234.5"), "1234.50");
    assert_eq!(clean_total_amount("abc"), "0.00");
    assert_eq!(clean_appointment_number(" 2024001 \n"), "2024001");
}
