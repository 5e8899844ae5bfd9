//! Shared integration-test harness: builds a disposable project with fake
//! build tool installations and spawns the buildbench binary against it.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

/// Java source used as a mutation target.
pub const JAVA_SOURCE: &str =
    "class Library {\n    int version() {\n        return 1;\n    }\n}\n";

/// Android resource file used as a mutation target.
pub const RESOURCE_SOURCE: &str =
    "<resources>\n<string name=\"app_name\">Example</string>\n</resources>\n";

/// A fake Gradle launcher. It echoes the markers the suites assert on:
/// one `<gradle-version: V>`, `<daemon: B>`, and `<tasks: […]>` line per
/// invocation, writes the pid/trace files requested through `-D`
/// properties, and can be made to fail after a fixed number of runs via
/// `BB_COUNT_FILE` / `BB_FAIL_AFTER`.
const GRADLE_SCRIPT: &str = r#"#!/bin/sh
version="@VERSION@"
daemon=true
stop=0
pid_file=""
trace_file=""
scan=0
tasks=""
for arg in "$@"; do
  case "$arg" in
    --daemon) daemon=true ;;
    --no-daemon) daemon=false ;;
    --stop) stop=1 ;;
    -Dbuildbench.pid.file=*) pid_file="${arg#-Dbuildbench.pid.file=}" ;;
    -Dbuildbench.trace.file=*) trace_file="${arg#-Dbuildbench.trace.file=}" ;;
    --init-script=*build-scan*) scan=1 ;;
    -*) ;;
    *) if [ -z "$tasks" ]; then tasks="$arg"; else tasks="$tasks, $arg"; fi ;;
  esac
done
if [ "$stop" = 1 ]; then
  echo "Stopping daemon(s)."
  exit 0
fi
count=0
if [ -n "$BB_COUNT_FILE" ]; then
  count=$(cat "$BB_COUNT_FILE" 2>/dev/null || echo 0)
  count=$((count + 1))
  echo "$count" > "$BB_COUNT_FILE"
fi
if [ -n "$pid_file" ]; then
  mkdir -p "$(dirname "$pid_file")"
  echo $$ > "$pid_file"
fi
if [ -n "$trace_file" ]; then
  mkdir -p "$(dirname "$trace_file")"
  echo "<html>trace</html>" > "$trace_file"
fi
echo "Welcome to Gradle $version."
echo "<gradle-version: $version>"
echo "<daemon: $daemon>"
echo "<tasks: [$tasks]>"
if [ "$scan" = 1 ]; then
  echo "Publishing build information..."
fi
if [ -n "$BB_FAIL_AFTER" ] && [ "$count" -gt "$BB_FAIL_AFTER" ]; then
  echo "FAILURE: Build failed with an exception." >&2
  exit 1
fi
exit 0
"#;

/// A fake `jcmd` that materializes the recording on `JFR.stop`.
const JCMD_SCRIPT: &str = r#"#!/bin/sh
pid="$1"; shift
cmd="$1"; shift
case "$cmd" in
  JFR.start) echo "Started recording for $pid" ;;
  JFR.stop)
    for arg in "$@"; do
      case "$arg" in
        filename=*)
          file="${arg#filename=}"
          mkdir -p "$(dirname "$file")"
          echo "JFR" > "$file"
          ;;
      esac
    done
    echo "Stopped recording for $pid"
    ;;
esac
exit 0
"#;

/// A fake `buckw` exposing a fixed target tree.
const BUCKW_SCRIPT: &str = r#"#!/bin/sh
cmd="$1"; shift
if [ "$cmd" = targets ]; then
  if [ "$1" = "--type" ]; then
    echo "//target:$2_target"
  else
    echo "//target:android_binary"
    echo "//target:java_library"
    echo "//target:cpp_library"
    echo "//target/child:android_library"
    echo "//target/child:cpp_library"
  fi
elif [ "$cmd" = build ]; then
  echo "<building: $*>"
fi
exit 0
"#;

/// A disposable project tree with fake tool installations.
pub struct BenchProject {
    root: tempfile::TempDir,
}

impl BenchProject {
    /// Creates the project skeleton (build file plus mutation targets).
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let project = root.path().join("project");
        std::fs::create_dir_all(project.join("src/main/java")).unwrap();
        std::fs::create_dir_all(project.join("src/main/res/values")).unwrap();
        std::fs::write(project.join("build.gradle"), "apply plugin: 'java'\n").unwrap();
        std::fs::write(project.join("src/main/java/Library.java"), JAVA_SOURCE).unwrap();
        std::fs::write(
            project.join("src/main/res/values/strings.xml"),
            RESOURCE_SOURCE,
        )
        .unwrap();
        Self { root }
    }

    pub fn root(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root.path().join("project")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn user_home(&self) -> PathBuf {
        self.root.path().join("user-home")
    }

    /// Installs a fake Gradle distribution for the given version under the
    /// isolated user home.
    pub fn install_gradle(&self, version: &str) {
        let bin = self
            .user_home()
            .join("distributions")
            .join(format!("gradle-{version}"))
            .join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        write_executable(&bin.join("gradle"), &GRADLE_SCRIPT.replace("@VERSION@", version));
    }

    /// Installs the fake `buckw` wrapper into the project directory.
    pub fn install_buckw(&self) {
        write_executable(&self.project_dir().join("buckw"), BUCKW_SCRIPT);
    }

    /// Installs a fake Maven installation and returns the MAVEN_HOME to
    /// export.
    pub fn install_maven(&self) -> PathBuf {
        let maven_home = self.root.path().join("maven-home");
        std::fs::create_dir_all(maven_home.join("bin")).unwrap();
        write_executable(
            &maven_home.join("bin/mvn"),
            "#!/bin/sh\necho \"<maven: $*>\"\nexit 0\n",
        );
        maven_home
    }

    /// Installs a fake `jcmd` and returns the JAVA_HOME to export.
    pub fn install_jcmd(&self) -> PathBuf {
        let java_home = self.root.path().join("java-home");
        std::fs::create_dir_all(java_home.join("bin")).unwrap();
        write_executable(&java_home.join("bin/jcmd"), JCMD_SCRIPT);
        java_home
    }

    /// Writes a scenario file next to the project and returns its path.
    pub fn write_scenario_file(&self, contents: &str) -> PathBuf {
        let path = self.root.path().join("performance.yaml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// A command for the buildbench binary, preloaded with the project,
    /// output, and user-home directories.
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_buildbench"));
        command
            .arg("--project-dir")
            .arg(self.project_dir())
            .arg("--output-dir")
            .arg(self.output_dir())
            .arg("--gradle-user-home")
            .arg(self.user_home())
            .current_dir(self.root.path());
        command
    }

    /// Runs the binary with extra arguments and returns its output.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut command = self.command();
        command.args(args);
        command.output().expect("failed to spawn buildbench")
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.output_dir().join("profile.log")).expect("read profile.log")
    }

    pub fn csv_contents(&self) -> String {
        std::fs::read_to_string(self.output_dir().join("benchmark.csv"))
            .expect("read benchmark.csv")
    }
}

/// Counts lines containing the given marker.
pub fn count_lines_with(haystack: &str, needle: &str) -> usize {
    haystack.lines().filter(|line| line.contains(needle)).count()
}

fn write_executable(path: &std::path::Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = std::fs::metadata(path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(path, permissions).unwrap();
    }
}
