use dspi_execution::{ExecutionManager, IdentityOutput, OutputManager, SimulatedAccelerator};
use error_stack::ResultExt;
use tracing::{info, info_span};

use crate::{Error, PlanArgs};

/// Options for the Run command.
#[derive(clap::Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub plan: PlanArgs,
}

impl RunCommand {
    /// Execute the plan on the simulated accelerator and print the result
    /// stream names.
    pub fn execute(self) -> error_stack::Result<Vec<String>, Error> {
        let span = info_span!("DSPI run");
        let _enter = span.enter();
        info!("Options: {:?}", self);

        let (graph, config) = self.plan.load()?;
        let mut manager = ExecutionManager::new(SimulatedAccelerator::default());
        let results = manager
            .execute(&graph, &config)
            .change_context(Error::Execution)?;
        let results = IdentityOutput
            .parse(results)
            .change_context(Error::Execution)?;

        #[allow(clippy::print_stdout)]
        for result in &results {
            println!("{result}");
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use dspi_testing::{testdata_case, TempConfigDir};

    use super::*;

    fn plan_args(time_limit: Option<f64>) -> PlanArgs {
        let case = testdata_case("filter_join");
        PlanArgs {
            graph: case.graph,
            config: case.config,
            time_limit,
        }
    }

    #[test]
    fn test_run_testdata() {
        let results = RunCommand {
            plan: plan_args(None),
        }
        .execute()
        .unwrap();
        assert_eq!(results, vec!["joined".to_owned()]);
    }

    #[test]
    fn test_time_limit_fails_run() {
        let error = RunCommand {
            plan: plan_args(Some(0.0)),
        }
        .execute()
        .unwrap_err();
        assert!(matches!(error.current_context(), Error::Execution));
    }

    #[test]
    fn test_missing_config() {
        let dir = TempConfigDir::try_new().unwrap();
        let error = RunCommand {
            plan: PlanArgs {
                graph: testdata_case("filter_join").graph,
                config: dir.config_path(),
                time_limit: None,
            },
        }
        .execute()
        .unwrap_err();
        assert!(matches!(error.current_context(), Error::ReadingInput));
        assert!(matches!(
            error.downcast_ref::<dspi_core::Error>(),
            Some(dspi_core::Error::ConfigurationNotFound(_))
        ));
    }
}
