//! Fake `httrack` executables for tests that exercise the real subprocess path.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const PREAMBLE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "HTTrack version 3.49-5 (fake)"
  exit 0
fi
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-O" ]; then out="$arg"; fi
  prev="$arg"
done
"#;

/// Mirrors two pages and exits 0.
pub const SUCCEEDS: &str = r#"mkdir -p "$out/example.com"
echo "<html>home</html>" > "$out/index.html"
echo "<html>about</html>" > "$out/example.com/about.html"
exit 0
"#;

/// Leaves a page behind but exits non-zero.
pub const PARTIAL: &str = r#"echo "<html>home</html>" > "$out/index.html"
echo "Done. 1 error(s), 4 warning(s)" >&2
exit 1
"#;

pub const NO_CONTENT: &str = r#"echo "Mirror aborted" >&2
exit 1
"#;

pub const DNS_FAILURE: &str = r#"echo "<html>error page</html>" > "$out/index.html"
echo "Error: Unable to get server's address: Unknown error" >&2
exit 1
"#;

/// Mirrors the page but one asset could not be fetched.
pub const DEAD_ASSET: &str = r#"echo "<html>home</html>" > "$out/index.html"
echo "Error: connection refused (-1) at link example.com/img/missing.png" >&2
exit 1
"#;

pub const NETWORK_DOWN: &str = r#"echo "Error: connect: Network is unreachable" >&2
exit 1
"#;

pub const HANGS: &str = "sleep 30\nexit 0\n";

/// Records its arguments to `$out/args.txt`, one per line, then succeeds.
pub const RECORDS_ARGS: &str = r#"for arg in "$@"; do printf '%s\n' "$arg" >> "$out/args.txt"; done
exit 0
"#;

/// Write an executable script named `httrack` into `dir`.
pub fn fake_httrack(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("httrack");
    fs::write(&path, format!("{PREAMBLE}{body}")).expect("write fake httrack");
    let mut perms = fs::metadata(&path).expect("stat fake httrack").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake httrack");
    path
}
