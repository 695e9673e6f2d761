use wsstream_client::DialPlan;

use crate::cmd::PlanArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: PlanArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.client.resolve(None)?;
    let options = config
        .dial_options()
        .map_err(|err| client_error("invalid client config", err))?;
    let payload = args.payload.resolve()?;

    let plan = DialPlan::for_first_write(&options, &payload)
        .map_err(|err| client_error("planning failed", err))?;
    let summary = plan.summary();

    let mut rows = vec![
        ("uri", summary.uri.clone()),
        ("early_bytes", summary.early_len.to_string()),
        ("late_bytes", summary.late_len.to_string()),
    ];
    for (name, value) in &summary.headers {
        rows.push(("header", format!("{name}: {value}")));
    }
    print_record(&summary, &rows, format);

    Ok(SUCCESS)
}
