use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=./.git/HEAD");
    println!("cargo:rerun-if-changed=./.git/refs");

    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());
    let version = match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(describe) => format!("{pkg_version} ({describe})"),
        None => pkg_version,
    };

    println!("cargo:rustc-env=TANDEM_VERSION={version}");
}
