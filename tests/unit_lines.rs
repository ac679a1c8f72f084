// Line-grouping stage behavior through the public `group_lines` entry.

use whisker::config::Settings;
use whisker::lines::{first_token_text, group_lines, join_texts};
use whisker::ocr::{TokenOrigin, TokenRecord, ValueFlag};

fn tok(text: &str, x: i32, w: i32, y: i32, conf: Option<f64>) -> TokenRecord {
    TokenRecord {
        text: text.to_string(),
        confidence: conf,
        x_left: Some(x),
        x_right: Some(x + w),
        y_top: Some(y),
        y_bottom: Some(y + 20),
        y_center: None,
    }
}

#[test]
fn tokens_cluster_into_reading_order() {
    let records = vec![
        tok("5.5-19.5", 650, 80, 101, Some(0.98)),
        tok("WBC", 50, 60, 100, Some(0.99)),
        tok("HCT", 50, 60, 140, Some(0.99)),
        tok("8.5", 250, 40, 99, Some(0.97)),
        tok("41", 250, 30, 141, Some(0.97)),
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(join_texts(&lines[0], " "), "WBC 8.5 5.5-19.5");
    assert_eq!(join_texts(&lines[1], " "), "HCT 41");
}

#[test]
fn low_confidence_tokens_are_dropped() {
    let records = vec![
        tok("WBC", 50, 60, 100, Some(0.99)),
        tok("smudge", 120, 40, 100, Some(0.2)),
        tok("8.5", 250, 40, 100, Some(0.99)),
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    assert_eq!(join_texts(&lines[0], " "), "WBC 8.5");
}

#[test]
fn confidence_free_tokens_are_kept() {
    let records = vec![tok("WBC", 50, 60, 100, None)];
    let lines = group_lines(records, &Settings::default()).unwrap();
    assert_eq!(first_token_text(&lines[0]), "WBC");
}

#[test]
fn geometry_free_tokens_are_dropped_silently() {
    let records = vec![
        tok("WBC", 50, 60, 100, Some(0.99)),
        TokenRecord {
            text: "floating".to_string(),
            confidence: Some(0.99),
            x_left: None,
            x_right: None,
            y_top: None,
            y_bottom: None,
            y_center: None,
        },
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].len(), 1);
}

#[test]
fn impossible_geometry_is_a_fatal_error() {
    let mut bad = tok("8.5", 100, 40, 100, Some(0.9));
    bad.x_left = Some(200);
    bad.x_right = Some(100);
    assert!(group_lines(vec![bad], &Settings::default()).is_err());
}

#[test]
fn glued_value_units_split_inside_the_pipeline() {
    let records = vec![
        tok("GLU", 50, 60, 100, Some(0.99)),
        tok("98mg/dL", 250, 120, 100, Some(0.96)),
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    let texts: Vec<&str> = lines[0].iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["GLU", "98", "mg/dL"]);
    assert_eq!(lines[0][1].origin, TokenOrigin::SplitValue);
    assert_eq!(lines[0][2].origin, TokenOrigin::SplitUnitCandidate);
    assert_eq!(lines[0][2].raw_unit.as_deref(), Some("mg/dL"));
}

#[test]
fn flags_are_annotated_and_status_words_removed() {
    let records = vec![
        tok("CRE", 50, 60, 100, Some(0.99)),
        tok("2.4H", 250, 50, 100, Some(0.96)),
        tok("HIGH", 350, 50, 100, Some(0.96)),
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    let texts: Vec<&str> = lines[0].iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["CRE", "2.4H"]);
    assert_eq!(lines[0][1].value_num.as_deref(), Some("2.4"));
    assert_eq!(lines[0][1].value_flag, Some(ValueFlag::High));
}

#[test]
fn name_fragments_fuse_before_splitting() {
    let records = vec![
        tok("SODIUM", 50, 80, 100, Some(0.99)),
        tok("(Na+)", 134, 50, 100, Some(0.95)),
        tok("148", 350, 40, 100, Some(0.98)),
    ];
    let lines = group_lines(records, &Settings::default()).unwrap();
    assert_eq!(first_token_text(&lines[0]), "SODIUM(Na+)");
    assert_eq!(lines[0].len(), 2);
}

#[test]
fn trivial_inputs_are_tolerated() {
    assert!(group_lines(Vec::new(), &Settings::default()).unwrap().is_empty());
    let one = group_lines(vec![tok("WBC", 0, 40, 0, None)], &Settings::default()).unwrap();
    assert_eq!(one.len(), 1);
}
