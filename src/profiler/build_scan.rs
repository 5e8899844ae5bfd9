//! Build scan profiler.
//!
//! Injects an init script that applies the build-scan plugin at the
//! configured version, so every build of the measured phase publishes a
//! scan. Publication shows up in the run log as
//! `Publishing build information`; its absence after the measured phase
//! is reported as a warning.

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProfilerError;
use crate::profiler::{write_init_script, Profiler, ProfilerContext};

/// Marker the build-scan plugin prints when publishing.
pub const PUBLISH_MARKER: &str = "Publishing build information";

/// Build scan profiler.
#[derive(Debug)]
pub struct BuildScanProfiler {
    /// Plugin version applied by the generated init script.
    pub plugin_version: String,
}

impl BuildScanProfiler {
    fn init_script(&self) -> String {
        format!(
            r"initscript {{
    repositories {{
        maven {{ url 'https://plugins.gradle.org/m2' }}
    }}
    dependencies {{
        classpath 'com.gradle:build-scan-plugin:{version}'
    }}
}}

rootProject {{
    apply plugin: initscript.classLoader.loadClass('com.gradle.scan.plugin.BuildScanPlugin')
    buildScan {{
        licenseAgreementUrl = 'https://gradle.com/terms-of-service'
        licenseAgree = 'yes'
    }}
}}
",
            version = self.plugin_version
        )
    }
}

#[async_trait]
impl Profiler for BuildScanProfiler {
    fn name(&self) -> &'static str {
        "buildscan"
    }

    fn invocation_args(
        &mut self,
        ctx: &ProfilerContext,
    ) -> Result<Vec<String>, ProfilerError> {
        let script =
            write_init_script(&ctx.gradle_user_home, "build-scan.gradle", &self.init_script())?;
        Ok(vec![format!("--init-script={}", script.display())])
    }

    async fn finalize(&mut self, ctx: &ProfilerContext) -> Result<(), ProfilerError> {
        let log_contents = std::fs::read_to_string(ctx.log.path())?;
        if !log_contents.contains(PUBLISH_MARKER) {
            warn!(
                scenario = %ctx.scenario_name,
                "no build scan was published during the measured phase"
            );
            ctx.log.detail(&format!(
                "No build scan was published for scenario '{}'.",
                ctx.scenario_name
            ));
        }
        Ok(())
    }
}
