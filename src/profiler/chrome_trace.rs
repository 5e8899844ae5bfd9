//! Chrome trace profiler.
//!
//! Injects an init script that records task execution events and writes
//! them as `chrome-trace.html` into the output directory. Works with and
//! without a daemon since everything happens inside the build process.

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProfilerError;
use crate::profiler::{write_init_script, Profiler, ProfilerContext};

/// System property carrying the trace file path into the init script.
pub const TRACE_FILE_PROPERTY: &str = "buildbench.trace.file";

const TRACE_SCRIPT: &str = r"import groovy.json.JsonOutput
import java.util.concurrent.TimeUnit

def traceFile = new File(System.getProperty('buildbench.trace.file'))
def events = []
def clock = System.nanoTime()
gradle.taskGraph.beforeTask { task ->
    events << [name: task.path, cat: 'task', ph: 'B', pid: 0, tid: 0,
               ts: TimeUnit.NANOSECONDS.toMicros(System.nanoTime() - clock)]
}
gradle.taskGraph.afterTask { task ->
    events << [name: task.path, cat: 'task', ph: 'E', pid: 0, tid: 0,
               ts: TimeUnit.NANOSECONDS.toMicros(System.nanoTime() - clock)]
}
gradle.buildFinished {
    traceFile.parentFile?.mkdirs()
    def json = JsonOutput.toJson(events)
    traceFile.text = '<html><body><script>var traceEvents = ' + json + ';</script></body></html>'
}
";

/// Chrome trace profiler.
#[derive(Debug)]
pub struct ChromeTraceProfiler;

#[async_trait]
impl Profiler for ChromeTraceProfiler {
    fn name(&self) -> &'static str {
        "chrome-trace"
    }

    fn invocation_args(
        &mut self,
        ctx: &ProfilerContext,
    ) -> Result<Vec<String>, ProfilerError> {
        let script = write_init_script(&ctx.gradle_user_home, "chrome-trace.gradle", TRACE_SCRIPT)?;
        let trace_file = ctx.output_dir.join("chrome-trace.html");
        Ok(vec![
            format!("--init-script={}", script.display()),
            format!("-D{TRACE_FILE_PROPERTY}={}", trace_file.display()),
        ])
    }

    async fn finalize(&mut self, ctx: &ProfilerContext) -> Result<(), ProfilerError> {
        let trace_file = ctx.output_dir.join("chrome-trace.html");
        if !trace_file.exists() {
            warn!(path = %trace_file.display(), "no chrome trace was written");
            ctx.log
                .detail(&format!("No chrome trace found at {}", trace_file.display()));
        }
        Ok(())
    }
}
