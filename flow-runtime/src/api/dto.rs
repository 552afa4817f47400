//! # Wire DTOs
//!
//! The flow-execution HTTP API is a consumer contract only (§1/§6): routing,
//! JSON decoding, and CORS belong to a transport shim outside this crate.
//! These DTOs exist so that shim can serialize the facade's inputs/outputs
//! directly without redefining them.

use crate::domain::{FlowStatus, FlowStep, FlowStepType, FlowType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecuteRequest {
    #[validate(custom(function = "shared::validation::validators::not_blank"))]
    pub application_id: String,
    #[serde(default)]
    pub flow_type: Option<FlowType>,
    #[serde(default)]
    pub flow_id: Option<Uuid>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitiateFlowRequest {
    #[validate(custom(function = "shared::validation::validators::not_blank"))]
    pub application_id: String,
    pub flow_type: FlowType,
    #[serde(default)]
    pub runtime_data: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStepDataDto {
    #[serde(default)]
    pub inputs: Vec<crate::domain::InputSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub additional_data: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecuteResponseDto {
    pub flow_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub flow_status: FlowStatus,
    #[serde(rename = "type")]
    pub step_type: FlowStepType,
    pub data: FlowStepDataDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<FlowStep> for FlowExecuteResponseDto {
    fn from(step: FlowStep) -> Self {
        Self {
            flow_id: step.flow_id,
            step_id: step.step_id,
            flow_status: step.status,
            step_type: step.step_type,
            data: FlowStepDataDto {
                inputs: step.data.inputs,
                redirect_url: step.data.redirect_url,
                actions: step.data.actions,
                additional_data: step.data.additional_data,
            },
            assertion: step.assertion,
            failure_reason: step.failure_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateFlowResponseDto {
    pub flow_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_request_rejects_blank_application_id() {
        let request = FlowExecuteRequest {
            application_id: String::new(),
            flow_type: Some(FlowType::Authentication),
            flow_id: None,
            verbose: false,
            action: String::new(),
            inputs: HashMap::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn flow_step_converts_into_response_dto() {
        let step = FlowStep {
            flow_id: Uuid::new_v4(),
            step_id: None,
            step_type: FlowStepType::None,
            status: FlowStatus::Complete,
            data: crate::domain::FlowStepData::default(),
            assertion: Some("jwt".into()),
            failure_reason: None,
        };
        let dto: FlowExecuteResponseDto = step.into();
        assert_eq!(dto.flow_status, FlowStatus::Complete);
        assert_eq!(dto.assertion.as_deref(), Some("jwt"));
    }
}
