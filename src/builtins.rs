use std::process::Command;

/// Node.js built-in module names, matching `require('module').builtinModules`
/// on a current LTS release. depmon runs out-of-process, so the set is fixed
/// at compile time rather than queried from the host.
pub const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

pub fn is_builtin(name: &str) -> bool {
    NODE_BUILTINS.contains(&name)
}

/// Probe the host's Node.js version by invoking `node --version` once.
///
/// The original monitor reads `process.version` from inside the runtime; from
/// outside we shell out instead. Any failure degrades to `None` — builtin
/// records then carry version `unknown`.
pub fn detect_node_version() -> Option<String> {
    let output = Command::new("node").arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_builtins_present() {
        for name in ["fs", "path", "http", "child_process", "worker_threads"] {
            assert!(is_builtin(name), "{name} should be a builtin");
        }
    }

    #[test]
    fn test_third_party_names_absent() {
        for name in ["lodash", "express", "@scope/pkg", "left-pad"] {
            assert!(!is_builtin(name), "{name} should not be a builtin");
        }
    }
}
