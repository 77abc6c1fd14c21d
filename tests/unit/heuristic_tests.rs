use exec_console::config::{LaunchConfig, LongRunningConfig};
use exec_console::process::heuristic::is_long_running;
use exec_console::process::launcher::Launcher;

fn markers() -> Vec<String> {
    LongRunningConfig::default().markers
}

#[test]
fn gui_imports_are_flagged() {
    let source = "import javax.swing.JFrame;\npublic class Main {}";
    assert!(is_long_running(source, &markers()));
    assert!(is_long_running("import java.awt.*;", &markers()));
    assert!(is_long_running("import javafx.application.Application;", &markers()));
}

#[test]
fn console_programs_are_not_flagged() {
    let source = "import java.util.Scanner;\npublic class Main {}";
    assert!(!is_long_running(source, &markers()));
}

#[test]
fn empty_markers_never_match() {
    assert!(!is_long_running("anything", &[String::new()]));
    assert!(!is_long_running("anything", &[]));
}

#[test]
fn apply_to_all_flags_every_program() {
    let policy = LongRunningConfig {
        apply_to_all: true,
        ..LongRunningConfig::default()
    };
    let launcher = Launcher::new(LaunchConfig::default(), policy);
    assert!(launcher.is_flagged("public class Main {}"));
}

#[test]
fn launcher_uses_configured_markers() {
    let launcher = Launcher::new(LaunchConfig::default(), LongRunningConfig::default());
    assert!(launcher.is_flagged("new javax.swing.JFrame()"));
    assert!(!launcher.is_flagged("System.out.println(1);"));
}

#[test]
fn arguments_substitute_placeholders() {
    let launcher = Launcher::new(LaunchConfig::default(), LongRunningConfig::default());
    let args = launcher.arguments("Main", std::path::Path::new("/tmp/build"));
    assert_eq!(args, vec!["-cp", "/tmp/build", "Main"]);
}
