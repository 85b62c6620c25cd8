//! JSON-RPC Server
//!
//! Serves JSON-RPC 2.0 over HTTP and WebSocket on one TCP port. Plain calls
//! work over either transport; `queue.subscribe.v1` needs WebSocket.

use crate::handler::RpcHandler;
use crate::types::{
    AppointmentRequest, DepartmentRequest, IssueTokenRequest, ListAppointmentsRequest,
    SubscribeRequest, TokenRequest, TransitionRequest,
};
use healthpoint_core::application::BookingRequest;
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::{PendingSubscriptionSink, Server, ServerHandle, SubscriptionMessage};
use jsonrpsee::types::{ErrorObjectOwned, Params};
use jsonrpsee::RpcModule;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9637;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Start the JSON-RPC server; returns the bound address (useful with port 0)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = build_module(self.handler)?;

        info!(%local_addr, "JSON-RPC server started");
        Ok((local_addr, server.start(module)))
    }
}

/// Register every method on a fresh module
pub fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
    let mut module = RpcModule::new(());

    // Queue
    register(&mut module, &handler, "queue.issue.v1", |h, req: IssueTokenRequest| async move {
        h.issue(req).await
    })?;
    register(&mut module, &handler, "queue.transition.v1", |h, req: TransitionRequest| async move {
        h.transition(req).await
    })?;
    register(&mut module, &handler, "queue.delete.v1", |h, req: TokenRequest| async move {
        h.delete(req).await
    })?;
    register(&mut module, &handler, "queue.waiting.v1", |h, req: DepartmentRequest| async move {
        h.waiting(req).await
    })?;
    register(&mut module, &handler, "queue.token.v1", |h, req: TokenRequest| async move {
        h.token(req).await
    })?;
    register(&mut module, &handler, "queue.recompute.v1", |h, req: DepartmentRequest| async move {
        h.recompute(req).await
    })?;
    register_no_params(&mut module, &handler, "queue.stats.v1", |h| async move { h.stats().await })?;
    register_no_params(&mut module, &handler, "departments.list.v1", |h| async move {
        h.departments().await
    })?;

    // Appointments
    register(&mut module, &handler, "appointment.book.v1", |h, req: BookingRequest| async move {
        h.book(req).await
    })?;
    register(&mut module, &handler, "appointment.approve.v1", |h, req: AppointmentRequest| async move {
        h.approve(req).await
    })?;
    register(&mut module, &handler, "appointment.cancel.v1", |h, req: AppointmentRequest| async move {
        h.cancel_appointment(req).await
    })?;
    register(
        &mut module,
        &handler,
        "appointment.list.v1",
        |h, req: ListAppointmentsRequest| async move { h.list_appointments(req).await },
    )?;
    register_no_params(&mut module, &handler, "appointment.slots.v1", |h| async move {
        h.slots().await
    })?;

    // Admin
    register_no_params(&mut module, &handler, "admin.maintenance.v1", |h| async move {
        h.maintenance().await
    })?;

    // Live events
    let sub_handler = handler.clone();
    module
        .register_subscription(
            "queue.subscribe.v1",
            "queue.event",
            "queue.unsubscribe.v1",
            move |params, pending, _, _| {
                let handler = sub_handler.clone();
                async move { stream_events(handler, params, pending).await }
            },
        )
        .map_err(|e| e.to_string())?;

    Ok(module)
}

fn register<Req, Resp, F, Fut>(
    module: &mut RpcModule<()>,
    handler: &Arc<RpcHandler>,
    method: &'static str,
    call: F,
) -> Result<(), String>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Clone + Send + 'static,
    F: Fn(Arc<RpcHandler>, Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, ErrorObjectOwned>> + Send + 'static,
{
    let handler = handler.clone();
    module
        .register_async_method(method, move |params, _, _| {
            let handler = handler.clone();
            let call = call.clone();
            async move {
                let req: Req = params.parse()?;
                call(handler, req).await
            }
        })
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn register_no_params<Resp, F, Fut>(
    module: &mut RpcModule<()>,
    handler: &Arc<RpcHandler>,
    method: &'static str,
    call: F,
) -> Result<(), String>
where
    Resp: Serialize + Clone + Send + 'static,
    F: Fn(Arc<RpcHandler>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, ErrorObjectOwned>> + Send + 'static,
{
    let handler = handler.clone();
    module
        .register_async_method(method, move |_, _, _| {
            let handler = handler.clone();
            let call = call.clone();
            async move { call(handler).await }
        })
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Forward estimator events to one subscriber until it goes away
async fn stream_events(
    handler: Arc<RpcHandler>,
    params: Params<'static>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    let req: SubscribeRequest = if params.is_object() {
        match params.parse() {
            Ok(req) => req,
            Err(e) => {
                pending.reject(e).await;
                return Ok(());
            }
        }
    } else {
        SubscribeRequest::default()
    };

    let mut events = match handler.subscribe(req.department_id.as_deref()) {
        Ok(rx) => rx,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };

    let sink = pending.accept().await?;
    debug!(department_id = ?req.department_id, "Queue subscriber attached");

    loop {
        tokio::select! {
            _ = sink.closed() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(dept) = &req.department_id {
                        if event.department_id() != dept.as_str() {
                            continue;
                        }
                    }
                    let msg = SubscriptionMessage::from_json(&event)?;
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Queue subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!(department_id = ?req.department_id, "Queue subscriber detached");
    Ok(())
}
