use crate::config::Config;
use crate::cv_utils::{CANONICAL_ORDER, reconcile_upload};
use crate::error::ApiError;
use crate::request::PredictForm;
use crate::response::{PredictResponse, assemble};
use crate::state::AppState;
use crate::workspace::RequestWorkspace;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use inference::{Detector, ModelLoader, PredictOptions, Prediction};
use serde_json::{Map, Value, json};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

pub fn router<L>(state: AppState<L>) -> Router
where
    L: ModelLoader + 'static,
    L::Model: Detector + 'static,
{
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/predict_yolo", post(predict_yolo::<L>))
        .route("/health", get(health::<L>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
pub async fn serve<L>(config: Config, loader: L) -> anyhow::Result<()>
where
    L: ModelLoader + 'static,
    L::Model: Detector + 'static,
{
    let bind_addr = config.bind_addr.clone();
    let app = router(AppState::new(config, loader));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Liveness plus the device each cached model was bound to.
async fn health<L>(State(state): State<AppState<L>>) -> Json<Value>
where
    L: ModelLoader,
    L::Model: Detector,
{
    let devices: Map<String, Value> = state
        .cache
        .loaded()
        .into_iter()
        .map(|(key, model)| {
            let binding = model.device();
            let device = json!({
                "accelerator": binding.accelerator.as_str(),
                "half_precision": binding.half_precision,
                "accelerated": binding.is_accelerated(),
            });
            (key, device)
        })
        .collect();

    Json(json!({
        "status": "ok",
        "models_loaded": devices.len(),
        "devices": devices,
    }))
}

async fn predict_yolo<L>(
    State(state): State<AppState<L>>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError>
where
    L: ModelLoader + 'static,
    L::Model: Detector + 'static,
{
    let start = Instant::now();
    let span = tracing::info_span!("predict_yolo", model = tracing::field::Empty);

    let result = handle_predict(&state, &mut multipart)
        .instrument(span)
        .await;

    let (outcome, detections) = match &result {
        Ok(response) => ("success", response.detections.len()),
        Err(e) => (e.outcome(), 0),
    };
    state
        .metrics
        .record(outcome, detections, start.elapsed().as_secs_f64());

    result.map(Json)
}

async fn handle_predict<L>(
    state: &AppState<L>,
    multipart: &mut Multipart,
) -> Result<PredictResponse, ApiError>
where
    L: ModelLoader + 'static,
    L::Model: Detector + 'static,
{
    let form = PredictForm::from_multipart(multipart, &state.config).await?;

    let span = tracing::Span::current();
    span.record("model", form.model.as_str());
    tracing::info!(
        filename = %form.filename,
        bytes = form.data.len(),
        min_conf = form.min_conf,
        imgsz = form.imgsz,
        "Prediction requested"
    );

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        run_prediction(&state, &form)
    })
    .await
    .map_err(|e| ApiError::Processing(format!("prediction task failed: {}", e)))?
}

/// Cache lookup, inference, reconciliation and assembly for one request.
/// Blocking; the request workspace is gone by the time this returns.
pub fn run_prediction<L>(state: &AppState<L>, form: &PredictForm) -> Result<PredictResponse, ApiError>
where
    L: ModelLoader,
    L::Model: Detector,
{
    let mut workspace = RequestWorkspace::create(&state.config.upload_dir)
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    let image_path = workspace
        .store_upload(&form.filename, &form.data)
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    let model = state.cache.get_or_load(&form.model)?;

    let mut options = PredictOptions::new(form.min_conf as f32, form.imgsz);
    if state.config.save_artifacts {
        options.save_dir = Some(workspace.artifacts_dir());
    }

    let predictions = model.predict(&image_path, &options)?;
    workspace.track(
        predictions
            .iter()
            .flat_map(|prediction| prediction.artifacts.iter().cloned()),
    );

    let result = respond(state, form, predictions);
    workspace.close();
    result
}

fn respond<L: ModelLoader>(
    state: &AppState<L>,
    form: &PredictForm,
    predictions: Vec<Prediction>,
) -> Result<PredictResponse, ApiError> {
    let Some(prediction) = predictions.into_iter().next() else {
        return Err(ApiError::NoResults);
    };

    let detections = match prediction.detections.as_deref() {
        Some(detections) if !detections.is_empty() => detections,
        _ => return Err(ApiError::NoObjectsDetected),
    };

    let reconciled = match prediction.plot() {
        Ok(annotated) => Some(reconcile_upload(
            &form.data,
            annotated,
            prediction.renderer().channel_order,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render annotated image");
            None
        }
    };

    let response = match &reconciled {
        Some(reconciled) => {
            tracing::debug!(flipped = reconciled.flipped, "Channel reconciliation done");
            assemble(
                detections,
                form.min_conf,
                Some(&reconciled.image),
                reconciled.order,
                &state.names,
            )?
        }
        None => assemble(detections, form.min_conf, None, CANONICAL_ORDER, &state.names)?,
    };

    if response.detections.is_empty() {
        return Err(ApiError::NoObjectsDetected);
    }

    tracing::info!(
        detections = response.detections.len(),
        image_bytes = response.image.len(),
        "Prediction complete"
    );

    Ok(response)
}
