use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn agentpm(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("agentpm").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

fn write_epic(dir: &TempDir, name: &str, xml: &str) {
    std::fs::write(dir.path().join(name), xml).unwrap();
}

fn init(dir: &TempDir, epic: &str) {
    agentpm(dir)
        .args(["init", "--epic", epic])
        .assert()
        .success();
}

fn epic_on_disk(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap()
}

const FRESH_EPIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="8" name="Schema Management" status="pending" created_at="2025-08-15T09:00:00Z">
    <phases>
        <phase id="A" name="Setup" status="pending"/>
        <phase id="B" name="Core" status="pending"/>
    </phases>
    <tasks>
        <task id="A_1" phase_id="A" name="Create project" status="pending"/>
        <task id="A_2" phase_id="A" name="Add CI" status="pending"/>
    </tasks>
    <tests>
        <test id="T1" task_id="A_1" name="Project builds" status="pending" test_status="pending"/>
    </tests>
    <events/>
</epic>
"#;

// ---------------------------------------------------------------------------
// init / config / switch
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    let config = std::fs::read_to_string(dir.path().join(".agentpm.json")).unwrap();
    assert!(config.contains("\"current_epic\": \"epic-8.xml\""));
    assert!(config.contains("\"default_assignee\": \"agent\""));
}

#[test]
fn init_warns_when_epic_file_missing() {
    let dir = TempDir::new().unwrap();
    agentpm(&dir)
        .args(["init", "--epic", "missing.xml"])
        .assert()
        .success()
        .stderr(predicate::str::contains("does not exist"));
}

// Scenario: sequential config saves are atomic and leave no .tmp sibling.
#[test]
fn config_saves_are_atomic() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    write_epic(&dir, "epic-9.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["switch", "epic-9.xml"])
        .assert()
        .success();

    assert!(!dir.path().join(".agentpm.json.tmp").exists());
    let config = std::fs::read_to_string(dir.path().join(".agentpm.json")).unwrap();
    assert!(config.contains("\"current_epic\": \"epic-9.xml\""));
    assert!(config.contains("\"previous_epic\": \"epic-8.xml\""));
}

#[test]
fn switch_back_rotates_epics() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    write_epic(&dir, "epic-9.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["switch", "epic-9.xml"])
        .assert()
        .success();
    agentpm(&dir)
        .arg("switch-back")
        .assert()
        .success()
        .stdout(predicate::str::contains("epic-8.xml"));

    agentpm(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Current epic:     epic-8.xml"));
}

#[test]
fn switch_back_without_previous_fails() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir).arg("switch-back").assert().failure();
}

// ---------------------------------------------------------------------------
// Scenario 1: start-epic happy path, refused rerun
// ---------------------------------------------------------------------------

#[test]
fn start_epic_happy_path_then_refused() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["start-epic", "--time", "2025-08-16T15:30:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started epic 8"));

    let on_disk = epic_on_disk(&dir, "epic-8.xml");
    assert!(on_disk.contains("status=\"wip\""));
    assert!(on_disk.contains("type=\"epic_started\""));
    assert!(on_disk.contains("timestamp=\"2025-08-16T15:30:00Z\""));
    assert!(on_disk.contains(">Epic Schema Management started</event>"));

    agentpm(&dir)
        .args(["start-epic", "--time", "2025-08-16T15:31:00Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("from wip to wip"));

    // The refused rerun changed nothing.
    assert_eq!(on_disk, epic_on_disk(&dir, "epic-8.xml"));
}

// ---------------------------------------------------------------------------
// Scenario 2: completion blocked
// ---------------------------------------------------------------------------

const BLOCKED_EPIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="8" name="Schema Management" status="wip" created_at="2025-08-15T09:00:00Z">
    <phases>
        <phase id="P1" name="Phase One" status="done"/>
        <phase id="P2" name="Phase Two" status="pending"/>
    </phases>
    <tasks>
        <task id="K1" phase_id="P1" name="Task One" status="done"/>
    </tasks>
    <tests>
        <test id="T1" task_id="K1" name="Test One" status="done" test_status="done" result="passing"/>
        <test id="T2" task_id="K1" name="Test Two" status="pending" test_status="pending"/>
    </tests>
    <events/>
</epic>
"#;

#[test]
fn complete_epic_blocked_reports_structure() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", BLOCKED_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .arg("done-epic")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot complete epic:"))
        .stderr(predicate::str::contains("1 phase pending"))
        .stderr(predicate::str::contains("1 test failing"))
        .stderr(predicate::str::contains("Pending phases: P2 (Phase Two)"))
        .stderr(predicate::str::contains("Failing tests: T2 (Test Two)"));

    // No event was appended, no status change.
    let on_disk = epic_on_disk(&dir, "epic-8.xml");
    assert!(on_disk.contains("status=\"wip\""));
    assert!(on_disk.contains("<events/>"));
}

#[test]
fn completion_blocked_json_body() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", BLOCKED_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["done-epic", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"type\": \"completion_blocked\""))
        .stderr(predicate::str::contains("\"hint\""));
}

// ---------------------------------------------------------------------------
// Scenario 3: phase constraint with an actionable hint
// ---------------------------------------------------------------------------

#[test]
fn second_phase_start_names_the_active_phase() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir).arg("start-epic").assert().success();
    agentpm(&dir).args(["start-phase", "A"]).assert().success();

    agentpm(&dir)
        .args(["start-phase", "B"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "cannot start phase B: phase A is already active",
        ))
        .stderr(predicate::str::contains("done-phase A"));
}

// ---------------------------------------------------------------------------
// Scenario 4: reopening a done test
// ---------------------------------------------------------------------------

const PASSED_TEST_EPIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="8" name="Schema Management" status="wip" created_at="2025-08-15T09:00:00Z">
    <phases>
        <phase id="A" name="Setup" status="wip" started_at="2025-08-16T10:00:00Z"/>
    </phases>
    <tasks>
        <task id="A_1" phase_id="A" name="Create project" status="wip" started_at="2025-08-16T10:05:00Z"/>
    </tasks>
    <tests>
        <test id="T1" task_id="A_1" name="Project builds" status="done" test_status="done" result="passing"/>
    </tests>
    <events/>
</epic>
"#;

#[test]
fn fail_test_reopens_and_logs_blocker() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", PASSED_TEST_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args([
            "fail-test",
            "T1",
            "assertion",
            "failed",
            "--time",
            "2025-08-16T15:30:00Z",
        ])
        .assert()
        .success();

    let on_disk = epic_on_disk(&dir, "epic-8.xml");
    assert!(on_disk.contains("test_status=\"wip\""));
    assert!(on_disk.contains("result=\"failing\""));
    assert!(on_disk.contains("<failure_note>assertion failed</failure_note>"));
    assert!(on_disk.contains("type=\"test_failed\""));
    assert!(on_disk.contains("type=\"blocker\""));

    // Both events carry the same timestamp.
    let count = on_disk.matches("timestamp=\"2025-08-16T15:30:00Z\"").count();
    assert_eq!(count, 2);
}

// ---------------------------------------------------------------------------
// Scenario 5: weighted completion percent
// ---------------------------------------------------------------------------

const WEIGHTED_EPIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="9" name="Weighted" status="wip" created_at="2025-08-15T09:00:00Z">
    <phases>
        <phase id="P1" name="One" status="done"/>
        <phase id="P2" name="Two" status="pending"/>
    </phases>
    <tasks>
        <task id="K1" phase_id="P1" name="T1" status="done"/>
        <task id="K2" phase_id="P1" name="T2" status="done"/>
        <task id="K3" phase_id="P2" name="T3" status="pending"/>
        <task id="K4" phase_id="P2" name="T4" status="pending"/>
        <task id="K5" phase_id="P2" name="T5" status="pending"/>
    </tasks>
    <tests>
        <test id="X1" task_id="K1" name="X1" status="done" test_status="done" result="passing"/>
        <test id="X2" task_id="K2" name="X2" status="done" test_status="done" result="passing"/>
        <test id="X3" task_id="K3" name="X3" status="pending" test_status="pending"/>
        <test id="X4" task_id="K4" name="X4" status="pending" test_status="pending"/>
    </tests>
    <events/>
</epic>
"#;

#[test]
fn status_shows_weighted_completion() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-9.xml", WEIGHTED_EPIC);
    init(&dir, "epic-9.xml");

    agentpm(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completion: 46%"))
        .stdout(predicate::str::contains("Phases:     1/2 done"));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn current_and_pending_track_lifecycle() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("Next action:  Start next phase: Setup"));

    agentpm(&dir).arg("start-epic").assert().success();
    agentpm(&dir).args(["start-phase", "A"]).assert().success();
    agentpm(&dir).args(["start-task", "A_1"]).assert().success();

    agentpm(&dir)
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active phase: A (Setup)"))
        .stdout(predicate::str::contains("Active task:  A_1 (Create project)"))
        .stdout(predicate::str::contains(
            "Next action:  Continue work on: Create project",
        ));

    agentpm(&dir)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("A_2"))
        .stdout(predicate::str::contains("T1"));
}

#[test]
fn events_are_newest_first_with_limit() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["start-epic", "--time", "2025-08-16T10:00:00Z"])
        .assert()
        .success();
    agentpm(&dir)
        .args(["start-phase", "A", "--time", "2025-08-16T10:01:00Z"])
        .assert()
        .success();
    agentpm(&dir)
        .args(["log", "midway checkpoint", "--time", "2025-08-16T10:02:00Z"])
        .assert()
        .success();

    let out = agentpm(&dir)
        .args(["events", "--limit", "2"])
        .assert()
        .success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let implementation = stdout.find("implementation").expect("newest event shown");
    let phase_started = stdout.find("phase_started").expect("second event shown");
    assert!(implementation < phase_started);
    assert!(!stdout.contains("epic_started"));
}

#[test]
fn log_uses_implementation_type_by_default() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["log", "wired", "up", "the", "parser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged implementation event"));

    let on_disk = epic_on_disk(&dir, "epic-8.xml");
    assert!(on_disk.contains("type=\"implementation\""));
    assert!(on_disk.contains("agent=\"agent\""));
    assert!(on_disk.contains(">wired up the parser</event>"));
}

#[test]
fn validate_reports_structural_warnings() {
    let dir = TempDir::new().unwrap();
    let drifted = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="8" name="Drift" status="wip" created_at="2025-08-15T09:00:00Z">
    <phases>
        <phase id="A" name="One" status="wip"/>
        <phase id="B" name="Two" status="wip"/>
    </phases>
    <tasks>
        <task id="K1" phase_id="MISSING" name="Orphan" status="pending"/>
    </tasks>
    <events/>
</epic>
"#;
    write_epic(&dir, "epic-8.xml", drifted);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("multiple active phases"))
        .stdout(predicate::str::contains("unknown phase MISSING"));
}

// ---------------------------------------------------------------------------
// Legacy documents
// ---------------------------------------------------------------------------

#[test]
fn legacy_status_vocabulary_loads_and_canonicalizes() {
    let dir = TempDir::new().unwrap();
    let legacy = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="7" name="Legacy" status="planning" created_at="2025-01-01T00:00:00Z">
    <phases>
        <phase id="A" name="One" status="active"/>
        <phase id="B" name="Two" status="completed"/>
    </phases>
    <tasks>
        <task id="K1" phase_id="A" name="Held" status="on_hold"/>
    </tasks>
    <events/>
</epic>
"#;
    write_epic(&dir, "legacy.xml", legacy);
    init(&dir, "legacy.xml");

    agentpm(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status:     pending"));

    // Any accepted write re-emits the unified vocabulary.
    agentpm(&dir).arg("start-epic").assert().success();
    let on_disk = epic_on_disk(&dir, "legacy.xml");
    assert!(!on_disk.contains("planning"));
    assert!(!on_disk.contains("active\""));
    assert!(!on_disk.contains("on_hold"));
    assert!(on_disk.contains("status=\"done\""));
}

// ---------------------------------------------------------------------------
// Error surfaces
// ---------------------------------------------------------------------------

#[test]
fn missing_epic_file_is_a_clean_error() {
    let dir = TempDir::new().unwrap();
    init(&dir, "absent.xml");

    agentpm(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.xml"));
}

#[test]
fn missing_config_is_a_clean_error() {
    let dir = TempDir::new().unwrap();
    agentpm(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn file_override_bypasses_config() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "other.xml", FRESH_EPIC);

    agentpm(&dir)
        .args(["status", "-f", "other.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema Management"));
}

#[test]
fn cancel_task_requires_reason_and_persists_it() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir)
        .args(["cancel-task", "A_2", "descoped", "after", "review"])
        .assert()
        .success();

    let on_disk = epic_on_disk(&dir, "epic-8.xml");
    assert!(on_disk.contains("status=\"cancelled\""));
    assert!(on_disk.contains("<cancellation_reason>descoped after review</cancellation_reason>"));
    assert!(on_disk.contains("type=\"task_cancelled\""));
}

#[test]
fn start_task_outside_active_phase_gets_prerequisite_hint() {
    let dir = TempDir::new().unwrap();
    write_epic(&dir, "epic-8.xml", FRESH_EPIC);
    init(&dir, "epic-8.xml");

    agentpm(&dir).arg("start-epic").assert().success();
    agentpm(&dir)
        .args(["start-task", "A_1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("phase A is not active"))
        .stderr(predicate::str::contains("start-phase A"));
}
