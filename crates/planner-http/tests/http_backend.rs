use planner_core::{
    CatalogApi, LeafId, PlannerConfig, PlannerError, ProgramId, RecordId, RecordPatch, TenantId,
};
use planner_http::HttpCatalog;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Filter;

const TOKEN: &str = "t0k";

type Captured = Arc<Mutex<Vec<Value>>>;

fn reply(auth: Option<String>, status: StatusCode, body: Value) -> Response {
    if auth.as_deref() != Some(format!("Bearer {TOKEN}").as_str()) {
        return warp::reply::with_status(
            warp::reply::json(&json!({"detail": "Token inválido"})),
            StatusCode::UNAUTHORIZED,
        )
        .into_response();
    }
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn serve(captured: Captured) -> String {
    let auth = warp::header::optional::<String>("authorization");

    let programs = warp::get()
        .and(warp::path!("catalogo" / "subprogramas"))
        .and(auth.clone())
        .map(|a| {
            reply(
                a,
                StatusCode::OK,
                json!([{"id": 1, "nombre": "P1"}, {"nombre": "sin id"}]),
            )
        });

    let leaves = warp::get()
        .and(warp::path!("catalogo" / "subprogramas" / i64 / "submodulos"))
        .and(auth.clone())
        .map(|program: i64, a| {
            reply(
                a,
                StatusCode::OK,
                json!([{"id": program * 10, "nombre": "L1"}, {"id": 11, "name": "L2"}]),
            )
        });

    let summary = warp::get()
        .and(warp::path!("api" / "resumen" / "submodulo" / i64 / i64))
        .and(auth.clone())
        .map(|tenant: i64, leaf: i64, a| {
            if tenant == 7 && leaf == 10 {
                reply(
                    a,
                    StatusCode::OK,
                    json!({
                        "evidencias_total": 3,
                        "avance_promedio": 66.5,
                        "avance_rangos": {"0_24": 1, "50_74": 1, "mas_100": 1},
                        "registros": [
                            {"responsable": "Ana", "updated_at": "2024-01-01T10:00:00Z"},
                            {"responsable": "", "updated_at": "2024-02-01T10:00:00Z"}
                        ]
                    }),
                )
            } else {
                reply(a, StatusCode::NOT_FOUND, json!({"detail": "Not Found"}))
            }
        });

    let legacy = warp::get()
        .and(warp::path!("api" / "resumen" / "submodulo" / i64))
        .and(auth.clone())
        .map(|_leaf: i64, a| {
            reply(
                a,
                StatusCode::FORBIDDEN,
                json!({"detail": "Requiere rol cliente (IES)"}),
            )
        });

    let records = warp::get()
        .and(warp::path!("operacion" / "ies" / String / "submodulos" / i64 / "evidencias"))
        .and(auth.clone())
        .map(|slug: String, leaf: i64, a| {
            if slug != "norte" {
                return reply(a, StatusCode::NOT_FOUND, json!({"message": "IES no encontrada"}));
            }
            reply(
                a,
                StatusCode::OK,
                json!({"items": [{
                    "evidencia_id": 5,
                    "registro_id": null,
                    "orden": 1,
                    "titulo": format!("Plan {leaf}"),
                    "presenta": true,
                    "valoracion": 75,
                    "responsable": "Ana",
                    "fecha_inicio": "2024-01-10",
                    "fecha_fin": null,
                    "avance_pct": 40,
                    "updated_at": null
                }]}),
            )
        });

    let patch = warp::patch()
        .and(warp::path!("operacion" / "evidencias" / i64))
        .and(auth.clone())
        .and(warp::body::json())
        .map(move |id: i64, a, body: Value| {
            captured.lock().unwrap().push(body);
            reply(
                a,
                StatusCode::OK,
                json!({"ok": true, "registro_id": id + 100, "updated_at": "2024-03-01T00:00:00"}),
            )
        });

    let tenants = warp::get()
        .and(warp::path!("ies" / ..))
        .and(auth.clone())
        .map(|a| {
            reply(
                a,
                StatusCode::OK,
                json!([{"id": 7, "nombre": "Universidad Norte", "slug": "norte"}]),
            )
        });

    let routes = programs
        .or(leaves)
        .or(summary)
        .or(legacy)
        .or(records)
        .or(patch)
        .or(tenants);

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

async fn client() -> (HttpCatalog, Captured) {
    let captured = Captured::default();
    let base = serve(captured.clone()).await;
    let config = PlannerConfig::new()
        .with_base_url(base)
        .with_token(TOKEN);
    (HttpCatalog::new(&config).unwrap(), captured)
}

#[tokio::test]
async fn catalog_endpoints_decode() {
    let (api, _) = client().await;

    let programs = api.list_programs().await.unwrap();
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].name, "P1");

    let leaves = api.list_leaves(ProgramId(1)).await.unwrap();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].id, LeafId(10));
    assert_eq!(leaves[1].name, "L2");
    assert_eq!(leaves[1].parent_program_id, ProgramId(1));
}

#[tokio::test]
async fn summary_is_normalised() {
    let (api, _) = client().await;

    let summary = api.leaf_summary(TenantId(7), LeafId(10)).await.unwrap();
    assert_eq!(summary.total_evidence_count, 3);
    assert_eq!(summary.average_progress, Some(66.5));
    assert_eq!(summary.progress_bands.band_75_100, 1);
    assert_eq!(summary.progress_bands.band_25_49, 0);
    assert_eq!(summary.records[0].responsible, "Ana");
}

#[tokio::test]
async fn status_and_detail_surface() {
    let (api, _) = client().await;

    let err = api.leaf_summary(TenantId(7), LeafId(99)).await.unwrap_err();
    assert!(err.is_not_found());

    let err = api.legacy_leaf_summary(LeafId(99)).await.unwrap_err();
    assert!(err.is_role_mismatch());
    assert_eq!(err, PlannerError::http(403, "Requiere rol cliente (IES)"));

    let err = api.leaf_records("sur", LeafId(10)).await.unwrap_err();
    assert_eq!(err, PlannerError::http(404, "IES no encontrada"));
}

#[tokio::test]
async fn missing_credential_is_unauthorized() {
    let base = serve(Captured::default()).await;
    let api = HttpCatalog::new(&PlannerConfig::new().with_base_url(base)).unwrap();

    let err = api.list_programs().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err, PlannerError::http(401, "Token inválido"));
}

#[tokio::test]
async fn operational_records_and_patch() {
    let (api, captured) = client().await;

    let records = api.leaf_records("norte", LeafId(10)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, RecordId(5));
    assert_eq!(records[0].title, "Plan 10");
    assert_eq!(records[0].progress_pct, 40);

    let receipt = api
        .patch_record(
            RecordId(5),
            &RecordPatch::new().with_presents(true).with_progress(40),
        )
        .await
        .unwrap();
    assert_eq!(receipt.stored_id, Some(105));
    assert_eq!(
        captured.lock().unwrap().as_slice(),
        &[json!({"presenta": true, "avance_pct": 40})]
    );
}

#[tokio::test]
async fn tenant_directory() {
    let (api, _) = client().await;
    let tenants = api.list_tenants().await.unwrap();
    assert_eq!(tenants[0].id, TenantId(7));
    assert_eq!(tenants[0].slug, "norte");
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    let api = HttpCatalog::new(&PlannerConfig::new().with_base_url("http://127.0.0.1:1")).unwrap();
    assert!(matches!(
        api.list_programs().await,
        Err(PlannerError::Transport(_))
    ));
}
