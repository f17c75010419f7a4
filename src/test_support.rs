//! Fake ffmpeg/ffprobe programs for process-level tests.

use crate::config::EngineConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROBE_OK: &str = r#"echo '{"format":{"duration":"10.000000"}}'"#;
pub const PROBE_BROKEN: &str = "echo 'Invalid data found when processing input' >&2\nexit 1";

/// Sets `$in` and `$out` from the ffmpeg command line
const FIND_PATHS: &str = r#"prev=""
for a; do
  if [ "$prev" = "-i" ]; then in="$a"; fi
  prev="$a"
  out="$a"
done"#;

/// Reports 25%, 50%, 100% of a 10s input and writes a 2.5 MiB output.
/// Inputs named `*slow*` loop forever, `*fail*` exit with an error.
pub const ENCODE: &str = r#"case "$in" in
  *slow*)
    echo "partial" > "$out"
    while true; do
      echo "out_time_us=1000000"
      echo "progress=continue"
      sleep 1
    done
    ;;
  *fail*)
    echo "partial" > "$out"
    echo "Conversion failed!" >&2
    exit 3
    ;;
esac
echo "total_size=1024"
echo "out_time_us=2500000"
echo "progress=continue"
echo "out_time_us=5000000"
echo "progress=continue"
echo "out_time_us=10000000"
echo "progress=end"
dd if=/dev/zero of="$out" bs=1024 count=2560 2>/dev/null"#;

/// Writes `body` as an executable shell script and waits until it can be
/// exec'd (a concurrent fork may briefly hold the write handle open).
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\n[ -n \"$FAKE_CHECK\" ] && exit 0\n{}\n{}\n",
        FIND_PATHS, body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    for _ in 0..100 {
        match std::process::Command::new(&path)
            .env("FAKE_CHECK", "1")
            .status()
        {
            Ok(_) => return path,
            // ETXTBSY
            Err(e) if e.raw_os_error() == Some(26) => {
                std::thread::sleep(Duration::from_millis(20))
            }
            Err(e) => panic!("cannot run fake tool: {}", e),
        }
    }
    panic!("fake tool stayed busy");
}

/// Engine settings pointing at fake tools in `dir`
pub fn fake_engine_config(
    dir: &Path,
    ffmpeg_body: &str,
    ffprobe_body: &str,
    stall_timeout_secs: u64,
) -> EngineConfig {
    EngineConfig {
        ffmpeg: write_script(dir, "ffmpeg", ffmpeg_body),
        ffprobe: write_script(dir, "ffprobe", ffprobe_body),
        stall_timeout_secs,
        min_progress_delta: 0.01,
        kill_grace_ms: 2000,
    }
}

/// Creates a sparse input file of `len` bytes
pub fn make_input(dir: &Path, name: &str, len: u64) -> PathBuf {
    let path = dir.join(name);
    std::fs::File::create(&path).unwrap().set_len(len).unwrap();
    path
}
