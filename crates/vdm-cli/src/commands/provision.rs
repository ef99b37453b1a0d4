use std::time::Duration;

use tracing::info;
use vdm_app::{ProvisionOptions, RuntimeSettings};

use crate::cli::{OutputFormat, ProvisionArgs};
use crate::client::{CliContext, CliResult, app_failure};
use crate::output::render_provision_report;

pub(crate) async fn handle_provision(
    ctx: &CliContext,
    args: ProvisionArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let selection = args.selection.resolve()?;
    let provisioner = ctx
        .provisioner(RuntimeSettings {
            smb_timeout: Duration::from_secs(args.smb_timeout),
        })
        .await?;
    let options = ProvisionOptions {
        template_root: args.templates.template_root,
        create_source_dir: args.create_source_dir,
        concurrency: args.concurrency,
    };

    let report = provisioner
        .provision(&selection, &options)
        .await
        .map_err(|err| app_failure("provisioning failed", err))?;
    info!(
        source = %ctx.describe(),
        transfers = report.transfers.len(),
        aborted = report.aborted(),
        "provision command finished"
    );
    render_provision_report(&report, format)
}
