//! RPC Method Handlers
//!
//! Thin adapters from request types to the estimator and services.

use crate::error::to_rpc_error;
use crate::types::{
    AppointmentRequest, AppointmentsResponse, DepartmentRequest, DepartmentsResponse,
    IssueTokenRequest, ListAppointmentsRequest, MaintenanceResponse, RecomputeResponse,
    SlotsResponse, StatsResponse, TokenMutationResponse, TokenRequest, TransitionRequest,
    WaitingResponse,
};
use healthpoint_core::application::{
    AppointmentService, BookingRequest, MaintenanceScheduler, PersistStatus, QueueEstimator,
    Receipt,
};
use healthpoint_core::domain::{Appointment, DomainError, QueueEvent, TokenStatus};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    estimator: Arc<QueueEstimator>,
    appointments: Arc<AppointmentService>,
    maintenance: Arc<MaintenanceScheduler>,
    ack_timeout: Duration,
}

impl RpcHandler {
    /// # Arguments
    /// * `ack_timeout` - How long a mutation waits for its storage write
    pub fn new(
        estimator: Arc<QueueEstimator>,
        appointments: Arc<AppointmentService>,
        maintenance: Arc<MaintenanceScheduler>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            estimator,
            appointments,
            maintenance,
            ack_timeout,
        }
    }

    async fn settle<T>(&self, receipt: Receipt<T>) -> (T, PersistStatus) {
        let (value, ack) = receipt.into_parts();
        let status = ack.wait_timeout(self.ack_timeout).await;
        (value, status)
    }

    /// queue.issue.v1
    pub async fn issue(&self, params: IssueTokenRequest) -> RpcResult<TokenMutationResponse> {
        let receipt = self
            .estimator
            .issue_token(&params.department_id, params.priority)
            .map_err(to_rpc_error)?;

        let (token, status) = self.settle(receipt).await;
        Ok(TokenMutationResponse {
            token,
            persistence: status.into(),
        })
    }

    /// queue.transition.v1
    pub async fn transition(&self, params: TransitionRequest) -> RpcResult<TokenMutationResponse> {
        let status: TokenStatus = params.status.parse().map_err(to_rpc_error)?;
        let receipt = self
            .estimator
            .transition_status(&params.token_id, status)
            .map_err(to_rpc_error)?;

        let (token, status) = self.settle(receipt).await;
        Ok(TokenMutationResponse {
            token,
            persistence: status.into(),
        })
    }

    /// queue.delete.v1
    pub async fn delete(&self, params: TokenRequest) -> RpcResult<TokenMutationResponse> {
        let receipt = self
            .estimator
            .delete_token(&params.token_id)
            .map_err(to_rpc_error)?;

        let (token, status) = self.settle(receipt).await;
        Ok(TokenMutationResponse {
            token,
            persistence: status.into(),
        })
    }

    /// queue.waiting.v1
    pub async fn waiting(&self, params: DepartmentRequest) -> RpcResult<WaitingResponse> {
        let tokens = self
            .estimator
            .waiting_set(&params.department_id)
            .map_err(to_rpc_error)?;

        Ok(WaitingResponse {
            department_id: params.department_id,
            tokens,
        })
    }

    /// queue.token.v1
    pub async fn token(&self, params: TokenRequest) -> RpcResult<healthpoint_core::domain::Token> {
        self.estimator
            .get_token(&params.token_id)
            .map_err(to_rpc_error)
    }

    /// queue.recompute.v1
    pub async fn recompute(&self, params: DepartmentRequest) -> RpcResult<RecomputeResponse> {
        let receipt = self
            .estimator
            .recompute_estimates(&params.department_id)
            .map_err(to_rpc_error)?;

        let (tokens, status) = self.settle(receipt).await;
        Ok(RecomputeResponse {
            department_id: params.department_id,
            tokens,
            persistence: status.into(),
        })
    }

    /// queue.stats.v1
    pub async fn stats(&self) -> RpcResult<StatsResponse> {
        Ok(StatsResponse {
            departments: self.estimator.stats(),
        })
    }

    /// departments.list.v1
    pub async fn departments(&self) -> RpcResult<DepartmentsResponse> {
        Ok(DepartmentsResponse {
            departments: self.estimator.departments(),
        })
    }

    /// appointment.book.v1
    pub async fn book(&self, params: BookingRequest) -> RpcResult<Appointment> {
        self.appointments.book(params).await.map_err(to_rpc_error)
    }

    /// appointment.approve.v1
    pub async fn approve(&self, params: AppointmentRequest) -> RpcResult<Appointment> {
        self.appointments
            .approve(&params.appointment_id)
            .await
            .map_err(to_rpc_error)
    }

    /// appointment.cancel.v1
    pub async fn cancel_appointment(&self, params: AppointmentRequest) -> RpcResult<Appointment> {
        self.appointments
            .cancel(&params.appointment_id)
            .await
            .map_err(to_rpc_error)
    }

    /// appointment.list.v1
    pub async fn list_appointments(
        &self,
        params: ListAppointmentsRequest,
    ) -> RpcResult<AppointmentsResponse> {
        let appointments = match (params.patient_id, params.date) {
            (Some(patient_id), _) => self.appointments.list_for_patient(&patient_id).await,
            (None, Some(date)) => {
                self.appointments
                    .list_for_day(params.department_id.as_deref(), date)
                    .await
            }
            (None, None) => Err(DomainError::Validation(
                "either patient_id or date is required".to_string(),
            )
            .into()),
        }
        .map_err(to_rpc_error)?;

        Ok(AppointmentsResponse { appointments })
    }

    /// appointment.slots.v1
    pub async fn slots(&self) -> RpcResult<SlotsResponse> {
        Ok(SlotsResponse {
            slots: self.appointments.slots().to_vec(),
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(&self) -> RpcResult<MaintenanceResponse> {
        let report = self.maintenance.run_once().await.map_err(to_rpc_error)?;
        Ok(MaintenanceResponse::new(
            report.purge,
            report.evicted_from_memory,
        ))
    }

    /// Live event stream for queue.subscribe.v1
    pub fn subscribe(&self, department_id: Option<&str>) -> RpcResult<broadcast::Receiver<QueueEvent>> {
        if let Some(dept) = department_id {
            self.estimator.department(dept).map_err(to_rpc_error)?;
        }
        Ok(self.estimator.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use healthpoint_core::application::EstimatePolicy;
    use healthpoint_core::domain::{default_departments, default_slots};
    use healthpoint_core::port::mocks::{
        InMemoryAppointmentRepository, ManualClock, SequentialIdProvider,
    };
    use healthpoint_core::port::{Maintenance, MaintenanceConfig, MaintenanceStats};

    struct NoopMaintenance;

    #[async_trait::async_trait]
    impl Maintenance for NoopMaintenance {
        async fn purge_finished_tokens(&self, _before_ms: i64) -> healthpoint_core::Result<u64> {
            Ok(0)
        }
        async fn purge_cancelled_appointments(
            &self,
            _before_ms: i64,
        ) -> healthpoint_core::Result<u64> {
            Ok(0)
        }
        async fn vacuum(&self) -> healthpoint_core::Result<()> {
            Ok(())
        }
        async fn stats(&self) -> healthpoint_core::Result<MaintenanceStats> {
            Ok(MaintenanceStats::default())
        }
    }

    fn handler() -> RpcHandler {
        // 2026-03-02T00:00:00Z
        let clock = Arc::new(ManualClock::with_step(1_772_409_600_000, 1));
        let estimator = Arc::new(
            QueueEstimator::new(
                default_departments(),
                EstimatePolicy::default(),
                Arc::new(SequentialIdProvider::new("tok")),
                clock.clone(),
            )
            .unwrap(),
        );
        let appointments = Arc::new(AppointmentService::new(
            Arc::new(InMemoryAppointmentRepository::new()),
            default_departments(),
            default_slots(),
            Arc::new(SequentialIdProvider::new("appt")),
            clock.clone(),
        ));
        let maintenance = Arc::new(MaintenanceScheduler::new(
            Arc::new(NoopMaintenance),
            estimator.clone(),
            clock,
            MaintenanceConfig::default(),
            Duration::from_secs(3600),
        ));
        RpcHandler::new(estimator, appointments, maintenance, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_issue_and_transition() {
        let h = handler();
        let issued = h
            .issue(IssueTokenRequest {
                department_id: "GEN".into(),
                priority: false,
            })
            .await
            .unwrap();
        assert_eq!(issued.token.number, "GEN-001");
        assert_eq!(issued.token.estimated_wait_minutes, 20);
        // No persistence writer attached: acknowledged immediately
        assert!(issued.persistence.persisted);

        let called = h
            .transition(TransitionRequest {
                token_id: issued.token.id.clone(),
                status: "in_progress".into(),
            })
            .await
            .unwrap();
        assert_eq!(called.token.status, TokenStatus::InProgress);

        let err = h
            .transition(TransitionRequest {
                token_id: issued.token.id.clone(),
                status: "WAITING".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_errors_map_to_codes() {
        let h = handler();
        let err = h
            .waiting(DepartmentRequest {
                department_id: "XRAY".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);

        let err = h
            .transition(TransitionRequest {
                token_id: "tok-1".into(),
                status: "SLEEPING".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);

        let err = h
            .list_appointments(ListAppointmentsRequest {
                patient_id: None,
                department_id: Some("GEN".into()),
                date: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_stats_cover_every_department() {
        let h = handler();
        let stats = h.stats().await.unwrap();
        assert_eq!(stats.departments.len(), 6);
        assert_eq!(h.departments().await.unwrap().departments.len(), 6);
        assert_eq!(h.slots().await.unwrap().slots.len(), 12);
    }
}
