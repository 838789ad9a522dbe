#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;

use super::*;

fn shell(script: &str, timeout: u64) -> SolverCommand {
    SolverCommand::new("sh", Timeout::from_secs(timeout))
        .with_args(vec!["-c".into(), script.into(), "sh".into()])
}

#[test]
fn test_captures_both_streams() {
    let output = shell(r#"echo "$1 $2"; echo warning >&2"#, 10)
        .run(Path::new("models/m.mod"), Path::new("data/airland1.dat"))
        .unwrap();
    assert_eq!(output.stdout, "models/m.mod data/airland1.dat\n");
    assert_eq!(output.stderr, "warning\n");
    assert!(output.status.success());
}

#[test]
fn test_large_output_does_not_block() {
    let output = shell("seq 1 200000", 30)
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap();
    assert_eq!(output.stdout.lines().count(), 200000);
}

#[test]
fn test_non_zero_exit() {
    let err = shell("echo broken model >&2; exit 3", 10)
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap_err();
    match err {
        SweepError::SolverExit { status, stderr } => {
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr, "broken model");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_launch_failure() {
    let err = SolverCommand::new("no-such-solver-binary", Timeout::default())
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap_err();
    assert!(matches!(err, SweepError::SolverLaunch { .. }));
    assert!(err.aborts_sweep());
}

#[test]
fn test_timeout_kills_solver() {
    let start = Instant::now();
    let err = shell("exec sleep 30", 1)
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap_err();
    assert!(matches!(err, SweepError::SolverTimeout(_)));
    assert!(!err.aborts_sweep());
    assert!(start.elapsed() < Duration::from_secs(20));
}

#[test]
fn test_background_process_cannot_outlive_timeout() {
    let start = Instant::now();
    let err = shell("sleep 6 & echo done", 1)
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap_err();
    assert!(matches!(err, SweepError::SolverTimeout(_)), "{err}");
    assert!(start.elapsed() < Duration::from_secs(4));
}

fn alive(pid: &str) -> bool {
    Command::new("kill")
        .args(["-0", pid])
        .status()
        .map_or(false, |s| s.success())
}

#[test]
fn test_timeout_kills_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let err = shell(r#"sleep 30 & echo $! > "$2"; wait"#, 1)
        .run(Path::new("m.mod"), &pid_file)
        .unwrap_err();
    assert!(matches!(err, SweepError::SolverTimeout(_)));
    let pid = fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let deadline = Instant::now() + Duration::from_secs(5);
    while alive(&pid) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    assert!(!alive(&pid), "background sleep {pid} survived");
}

#[test]
fn test_cancel_stops_solver() {
    let flag = Arc::new(AtomicBool::new(false));
    let solver = shell("exec sleep 30", 60).with_cancel(Arc::clone(&flag));
    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        flag.store(true, Ordering::SeqCst);
    });
    let start = Instant::now();
    let err = solver
        .run(Path::new("m.mod"), Path::new("d.dat"))
        .unwrap_err();
    setter.join().unwrap();
    assert!(matches!(err, SweepError::Cancelled));
    assert!(err.aborts_sweep());
    assert!(start.elapsed() < Duration::from_secs(10));
}

struct BrokenStream;

impl Read for BrokenStream {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "device gone"))
    }
}

struct PanickingStream;

impl Read for PanickingStream {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        panic!("reader bug")
    }
}

#[test]
fn test_unreadable_output_is_an_error() {
    let deadline = Instant::now() + Duration::from_secs(5);
    let limit = Duration::from_secs(5);

    let rx = drain(Some(BrokenStream));
    let err = join(&rx, deadline, limit, "oplrun").unwrap_err();
    assert!(matches!(err, SweepError::Io { .. }));
    assert!(err.to_string().contains("device gone"));
    assert!(!err.aborts_sweep());

    let rx = drain(Some(PanickingStream));
    let err = join(&rx, deadline, limit, "oplrun").unwrap_err();
    assert!(matches!(err, SweepError::Io { .. }));
}

#[test]
fn test_tail() {
    assert_eq!(tail("abcdef", 3), "def");
    assert_eq!(tail(" ab\n", 10), "ab");
}
