//! Log file output honours the configured format.
//!
//! Installs the global subscriber, so this lives in its own test binary.

use rallytrack_common::logging::init_logging;
use rallytrack_common::LoggingConfig;

#[test]
fn json_file_logging_writes_one_object_per_line() {
    let path = std::env::temp_dir().join(format!("rallytrack-log-{}.jsonl", std::process::id()));
    let _ = std::fs::remove_file(&path);

    init_logging(&LoggingConfig {
        level: "info".to_string(),
        json: true,
        file: Some(path.clone()),
    });
    tracing::warn!(frame = 7, "json file marker");

    let content = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let line = content
        .lines()
        .find(|l| l.contains("json file marker"))
        .expect("marker event missing from log file");
    let event: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(event["level"], "WARN");
    assert_eq!(event["fields"]["frame"], 7);
    assert_eq!(event["fields"]["message"], "json file marker");
}
