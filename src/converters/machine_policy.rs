use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, register_data_lookup, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{Fields, import_comment, resource_reference};
use crate::model::octopus::MachinePolicy;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "MachinePolicies";
const TERRAFORM_TYPE: &str = "octopusdeploy_machine_policy";

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a `[d.]hh:mm:ss[.fffffff]` time span into nanoseconds
pub fn timespan_to_nanos(span: &str) -> Option<i64> {
    let (days, clock) = match span.split_once('.') {
        Some((days, rest)) if !days.contains(':') => (days.parse::<i64>().ok()?, rest),
        _ => (0, span),
    };

    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole: i64 = whole.parse().ok()?;
    let fraction_nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain("000000000".chars()).take(9).collect();
        digits.parse::<i64>().ok()?
    };

    let total_seconds = ((days * 24 + hours) * 60 + minutes) * 60 + whole;
    Some(total_seconds * NANOS_PER_SECOND + fraction_nanos)
}

fn nanos(span: &Option<String>) -> Option<i64> {
    span.as_deref().and_then(timespan_to_nanos)
}

pub struct MachinePolicyConverter {
    client: Arc<dyn SourceClient>,
}

impl MachinePolicyConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, policy: MachinePolicy, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("machinepolicy", &policy.name);

        if policy.is_default {
            return register_data_lookup(
                registry,
                &policy.id,
                RESOURCE_TYPE,
                "octopusdeploy_machine_policies",
                "machine_policies",
                name,
                json!({ "partial_name": policy.name }),
            );
        }

        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            policy.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let timeouts = Fields::new()
                    .with("connection_connect_timeout", nanos(&policy.connection_connect_timeout))
                    .with("connection_retry_sleep_interval", nanos(&policy.connection_retry_sleep_interval))
                    .with("connection_retry_time_limit", nanos(&policy.connection_retry_time_limit))
                    .with(
                        "polling_request_maximum_message_processing_timeout",
                        nanos(&policy.polling_request_maximum_message_processing_timeout),
                    )
                    .with("polling_request_queue_timeout", nanos(&policy.polling_request_queue_timeout));

                let cleanup = &policy.machine_cleanup_policy;
                let health = &policy.machine_health_check_policy;
                let update = &policy.machine_update_policy;

                ctx.hcl.render(
                    "machine_policy",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &policy.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": policy.name,
                        "description": policy.description,
                        "timeouts": timeouts,
                        "connection_retry_count_limit": policy.connection_retry_count_limit,
                        "cleanup": {
                            "delete_machines_behavior": cleanup.delete_machines_behavior,
                            "delete_machines_elapsed_timespan": nanos(&cleanup.delete_machines_elapsed_timespan),
                        },
                        "connectivity_behavior": policy.machine_connectivity_policy.machine_connectivity_behavior,
                        "health_check": {
                            "health_check_interval": nanos(&health.health_check_interval),
                            "health_check_type": health.health_check_type,
                            "bash_run_type": health.bash_health_check_policy.run_type,
                            "bash_script_body": health.bash_health_check_policy.script_body.clone().unwrap_or_default(),
                            "powershell_run_type": health.power_shell_health_check_policy.run_type,
                            "powershell_script_body": health.power_shell_health_check_policy.script_body.clone().unwrap_or_default(),
                        },
                        "update": {
                            "calamari_update_behavior": update.calamari_update_behavior,
                            "tentacle_update_behavior": update.tentacle_update_behavior,
                        },
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for MachinePolicyConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for policy in self.client.fetch_all::<MachinePolicy>(RESOURCE_TYPE)? {
            if should_export(&policy.id, RESOURCE_TYPE, registry, visited) {
                self.register(policy, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for MachinePolicyConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<MachinePolicy>(RESOURCE_TYPE, id)? {
            Some(policy) => self.register(policy, registry),
            None => Ok(()),
        }
    }
}
