mod common;

use common::{fixture, have_git};
use kaihistory::state::{AppCommand, DiffMode, DiffResult};

fn work_fixture() -> common::Fixture {
    let fx = fixture();
    fx.init_project();
    fx.service
        .run_command(AppCommand::StartWork {
            name: "alpha".to_string(),
        })
        .expect("start work");
    fx
}

#[test]
fn test_diff_without_open_folder_is_rejected() {
    let fx = fixture();
    let err = fx
        .service
        .diff("a.txt", DiffMode::Unstaged)
        .expect_err("no folder open");
    assert_eq!(err.code(), "workspace-not-ready");
}

#[test]
fn test_diff_rejects_traversal_path() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    let err = fx
        .service
        .diff("../../etc/passwd", DiffMode::Unstaged)
        .expect_err("traversal");
    assert_eq!(err.code(), "invalid-path");
}

#[test]
fn test_untracked_text_diff_returns_contents() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    fx.write("fresh.txt", "line one\nline two\n");
    match fx.service.diff("fresh.txt", DiffMode::Untracked).unwrap() {
        DiffResult::Text { text } => assert_eq!(text, "line one\nline two\n"),
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn test_untracked_binary_is_flagged_not_dumped() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    std::fs::write(fx.root.join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
    match fx.service.diff("blob.bin", DiffMode::Untracked).unwrap() {
        DiffResult::Binary { .. } => {}
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_untracked_oversized_file_is_refused() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    fx.write("huge.txt", &"a".repeat(1_000_001));
    match fx.service.diff("huge.txt", DiffMode::Untracked).unwrap() {
        DiffResult::TooLarge { .. } => {}
        other => panic!("expected too-large, got {:?}", other),
    }
}

#[test]
fn test_oversized_tracked_diff_is_refused() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    fx.write("big.txt", "small\n");
    fx.service
        .run_command(AppCommand::Stage {
            paths: vec!["big.txt".to_string()],
        })
        .expect("stage");
    fx.service
        .run_command(AppCommand::SaveHistory {
            message: Some("add big file".to_string()),
        })
        .expect("save");

    fx.write("big.txt", &"b".repeat(1_000_001));
    match fx.service.diff("big.txt", DiffMode::Unstaged).unwrap() {
        DiffResult::TooLarge { .. } => {}
        other => panic!("expected too-large, got {:?}", other),
    }
}

#[test]
fn test_missing_untracked_file_is_not_found() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    match fx.service.diff("absent.txt", DiffMode::Untracked).unwrap() {
        DiffResult::NotFound { .. } => {}
        other => panic!("expected not-found, got {:?}", other),
    }
}

#[test]
fn test_unstaged_diff_shows_edit() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    fx.write("AGENTS.md", "rewritten\n");
    match fx.service.diff("AGENTS.md", DiffMode::Unstaged).unwrap() {
        DiffResult::Text { text } => {
            assert!(text.contains("+rewritten"), "diff body: {}", text);
        }
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn test_staged_diff_only_covers_index() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    fx.write("AGENTS.md", "staged version\n");
    fx.service
        .run_command(AppCommand::Stage {
            paths: vec!["AGENTS.md".to_string()],
        })
        .expect("stage");
    fx.write("AGENTS.md", "further edit\n");

    match fx.service.diff("AGENTS.md", DiffMode::Staged).unwrap() {
        DiffResult::Text { text } => {
            assert!(text.contains("+staged version"), "diff body: {}", text);
            assert!(!text.contains("further edit"), "diff body: {}", text);
        }
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn test_staged_binary_uses_numstat_marker() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    std::fs::write(fx.root.join("blob.bin"), [0u8, 1, 2, 3]).unwrap();
    fx.service
        .run_command(AppCommand::Stage {
            paths: vec!["blob.bin".to_string()],
        })
        .expect("stage");
    match fx.service.diff("blob.bin", DiffMode::Staged).unwrap() {
        DiffResult::Binary { .. } => {}
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_clean_tracked_file_diff_is_empty_text() {
    if !have_git() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let fx = work_fixture();
    match fx.service.diff("AGENTS.md", DiffMode::Unstaged).unwrap() {
        DiffResult::Text { text } => assert_eq!(text, "No changes."),
        other => panic!("expected text, got {:?}", other),
    }
}
