use std::process::Command;

/// Trimmed stdout of `program args`, or "unknown" when it cannot run
fn capture(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let commit = capture("git", &["rev-parse", "--short", "HEAD"]);
    let date = capture("date", &["+%Y-%m-%d"]);
    // "rustc 1.80.0 (051478957 2024-07-21)" -> "1.80.0"
    let rustc = capture("rustc", &["--version"])
        .split_whitespace()
        .nth(1)
        .unwrap_or("unknown")
        .to_string();

    for (key, value) in [
        ("MERIDIAN_COMMIT_SHA", commit),
        ("MERIDIAN_BUILD_DATE", date),
        ("MERIDIAN_RUSTC_VERSION", rustc),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}
