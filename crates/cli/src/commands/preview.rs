use std::sync::Arc;

use approvo_core::errors::ApplicationError;
use approvo_core::service::PreviewRequest;
use approvo_core::views::ReferenceDirectory;
use approvo_core::workflow::PlannedStep;
use approvo_core::ProposalService;
use approvo_db::SqlWorkflowStore;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::commands::{
    open_migrated, prepare, CommandResult, Failure, EXIT_DATABASE, EXIT_VALIDATION,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewLine {
    step_order: u32,
    rule_id: i32,
    approver_role: String,
    approver_user: Option<String>,
    observations: &'static str,
}

pub fn run(amount: Decimal, area: i32, project_type: i32) -> CommandResult {
    let (config, runtime) = match prepare("preview") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;
        let service = ProposalService::new(Arc::new(SqlWorkflowStore::new(pool.clone())));

        let request = PreviewRequest { amount, area, project_type };
        let planned = service.preview_steps(request, "cli-preview").await.map_err(classify);
        let directory = service.reference_directory().await.map_err(classify);
        pool.close().await;

        Ok::<_, Failure>(render(&planned?, &directory?))
    });

    match result {
        Ok(lines) => {
            let message = format!("{} approval step(s) would be generated", lines.len());
            let data = serde_json::to_value(&lines).unwrap_or(Value::Null);
            CommandResult::success_with_data("preview", message, Some(data))
        }
        Err(failure) => CommandResult::from_failure("preview", failure),
    }
}

fn render(
    planned: &[PlannedStep],
    directory: &ReferenceDirectory,
) -> Vec<PreviewLine> {
    planned
        .iter()
        .map(|step| {
            PreviewLine {
                step_order: step.step_order,
                rule_id: step.rule_id.0,
                approver_role: directory.role(step.approver_role_id).name,
                approver_user: step.assignment.approver().map(|id| directory.user(id).name),
                observations: step.assignment.observation(),
            }
        })
        .collect()
}

fn classify(error: ApplicationError) -> Failure {
    match error {
        ApplicationError::Domain(error) => ("validation", error.to_string(), EXIT_VALIDATION),
        ApplicationError::Persistence(message) => ("db_query", message, EXIT_DATABASE),
    }
}
