use vdm_app::{ProvisionOptions, RuntimeSettings};

use crate::cli::{OutputFormat, PlanArgs};
use crate::client::{CliContext, CliResult, app_failure};
use crate::output::render_plan;

pub(crate) async fn handle_plan(
    ctx: &CliContext,
    args: PlanArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let selection = args.selection.resolve()?;
    let provisioner = ctx.provisioner(RuntimeSettings::default()).await?;
    let options = ProvisionOptions {
        template_root: args.templates.template_root,
        ..ProvisionOptions::default()
    };
    let plan = provisioner
        .plan(&selection, &options)
        .map_err(|err| app_failure("planning failed", err))?;
    render_plan(&plan, format)
}
