//! End-to-end check that background launches strip completion variables.

use std::time::{Duration, Instant};

use bundr::complete::{BackgroundLauncher, ExecLauncher};

#[test]
fn spawned_child_sees_no_completion_variables() {
    let dir = tempfile::TempDir::new().unwrap();
    let out_path = dir.path().join("child-env.txt");

    // The launcher filters the snapshot it takes of this process's
    // environment, so the markers must be set on the process itself.
    unsafe {
        std::env::set_var("COMP_LINE", "bundr get ps:/app");
        std::env::set_var("COMP_POINT", "18");
        std::env::set_var("BUNDR_TEST_MARKER", "kept");
    }

    // Write-then-rename so the poll below never reads a half-written file.
    let tmp_path = dir.path().join("child-env.tmp");
    let launcher = ExecLauncher::with_program("/bin/sh");
    launcher
        .launch(&[
            "-c",
            &format!(
                "env > {tmp} && mv {tmp} {out}",
                tmp = tmp_path.display(),
                out = out_path.display()
            ),
        ])
        .expect("spawn detached child");

    unsafe {
        std::env::remove_var("COMP_LINE");
        std::env::remove_var("COMP_POINT");
        std::env::remove_var("BUNDR_TEST_MARKER");
    }

    // Fire-and-forget: launch() returned before the child finished, so poll
    // for its output.
    let deadline = Instant::now() + Duration::from_secs(5);
    let contents = loop {
        if let Ok(text) = std::fs::read_to_string(&out_path) {
            if !text.is_empty() {
                break text;
            }
        }
        assert!(Instant::now() < deadline, "child never wrote its environment");
        std::thread::sleep(Duration::from_millis(20));
    };

    assert!(
        !contents.contains("COMP_LINE") && !contents.contains("COMP_POINT"),
        "completion variables leaked into the child:\n{contents}"
    );
    assert!(
        contents.contains("BUNDR_TEST_MARKER=kept"),
        "unrelated variables must be inherited:\n{contents}"
    );
}
