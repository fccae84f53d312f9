use error_stack::ResultExt;
use itertools::Itertools;
use tracing::{info, info_span};

use crate::{Error, PlanArgs};

/// Options for the Schedule command.
#[derive(clap::Args, Debug)]
pub struct ScheduleCommand {
    #[command(flatten)]
    pub plan: PlanArgs,
}

impl ScheduleCommand {
    /// Schedule the plan without executing it and print the runs.
    pub fn execute(self) -> error_stack::Result<String, Error> {
        let span = info_span!("DSPI schedule");
        let _enter = span.enter();
        info!("Options: {:?}", self);

        let (graph, config) = self.plan.load()?;
        let runs = dspi_execution::plan(&graph, &config).change_context(Error::Scheduling)?;
        let plan = runs.iter().join("");

        #[allow(clippy::print_stdout)]
        {
            print!("{plan}");
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use dspi_testing::testdata_case;

    use super::*;

    #[test]
    fn test_schedule_testdata() {
        let case = testdata_case("filter_join");
        let command = ScheduleCommand {
            plan: PlanArgs {
                graph: case.graph,
                config: case.config,
                time_limit: None,
            },
        };
        let plan = command.execute().unwrap();
        insta::assert_snapshot!(plan, @r###"
        run 0: filter_filter [filter, filter]
          filter_a (filter, slot 2): in [0] out [0]
          filter_b (filter, slot 1): in [1] out [1]
        run 1: join [join]
          join (join, slot 1): in [0, 1] out [0]
        "###);
    }
}
