mod common;

use agencyos_core::config::{MediaConfig, ReportConfig};
use agencyos_core::contract::{MockPdfRenderer, PlanStore, RenderError};
use agencyos_core::normalize::ImageNormalizer;
use agencyos_core::paths::{PathBuilder, SegmentPolicy};
use agencyos_core::planner::Planner;
use agencyos_core::render::PrintPdfRenderer;
use agencyos_core::report::{CampaignReport, ReportDocument};
use common::{png, post, seeded_store, FakeRemote, AGENCY, CAMPAIGN};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

fn normalizer() -> ImageNormalizer {
    ImageNormalizer::with_timeout(MediaConfig::default(), Duration::from_secs(2), 70)
        .expect("http client should build")
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_ten_posts_render_two_pages_and_clean_up() {
    let posts = (1..=10).map(|i| post(i, &format!("Post {i}"), i as u32)).collect();
    let store = seeded_store(posts);
    let remote = FakeRemote::new();
    let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
    let planner = Planner::new(&store, &remote, &paths);

    // Videos resolve through provider thumbnails; the fake returns the stored bytes.
    for id in 1..=4 {
        planner
            .attach_post_file(AGENCY, id, "clip.mp4", png(900, 600))
            .await
            .unwrap()
            .expect("attachment should upload");
    }
    // Images resolve through a temporary link the fake makes unreachable.
    planner
        .attach_post_file(AGENCY, 5, "foto.jpg", png(10, 10))
        .await
        .unwrap();

    let temp = tempdir().unwrap();
    let captured: Arc<Mutex<Option<ReportDocument>>> = Arc::new(Mutex::new(None));
    let seen_images = Arc::new(Mutex::new(0usize));

    let mut renderer = MockPdfRenderer::new();
    let sink = Arc::clone(&captured);
    let image_count = Arc::clone(&seen_images);
    renderer.expect_render().times(1).returning(move |document| {
        let existing = document
            .pages
            .iter()
            .flat_map(|page| page.full_grid.iter())
            .filter_map(|slot| slot.image.as_deref())
            .filter(|path| path.exists())
            .count();
        *image_count.lock().unwrap() = existing;
        *sink.lock().unwrap() = Some(document.clone());
        Ok(b"%PDF-1.7 fake".to_vec())
    });

    let normalizer = normalizer();
    let report = CampaignReport::new(&planner, &normalizer, &renderer, ReportConfig::default())
        .with_temp_dir(temp.path());

    let pdf = report.build(AGENCY, CAMPAIGN).await.expect("report should build");
    assert_eq!(pdf, b"%PDF-1.7 fake".to_vec());

    let document = captured.lock().unwrap().take().expect("renderer was called");
    let titles: Vec<&str> = document.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Março Café", "Março Café - Pág 02"]);
    assert_eq!(document.client_handle, "@padaria.sj");
    assert_eq!(document.agency_handle, "Agência Luz", "agency falls back to trade name");
    let slots: Vec<_> = document.pages.iter().flat_map(|p| p.full_grid.iter()).collect();
    assert_eq!(slots.len(), 10);
    assert_eq!(slots.iter().filter(|s| s.is_video).count(), 4);
    assert_eq!(slots.iter().filter(|s| s.image.is_some()).count(), 4);
    assert_eq!(
        *seen_images.lock().unwrap(),
        4,
        "normalized thumbnails must exist while rendering"
    );
    assert!(dir_is_empty(temp.path()), "no temp file may outlive the request");
}

#[tokio::test]
async fn test_empty_campaign_renders_cover_only() {
    let store = seeded_store(vec![]);
    let remote = FakeRemote::new();
    let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
    let planner = Planner::new(&store, &remote, &paths);

    let mut renderer = MockPdfRenderer::new();
    renderer.expect_render().times(1).returning(|document| {
        assert_eq!(document.campaign_title, "Março Café");
        assert_eq!(document.period, "03/2025");
        assert!(document.pages.is_empty());
        Ok(vec![1])
    });
    let normalizer = normalizer();
    let report = CampaignReport::new(
        &planner,
        &normalizer,
        &renderer,
        ReportConfig::default(),
    );
    assert_eq!(report.build(AGENCY, CAMPAIGN).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_render_failure_still_removes_temp_files() {
    let store = seeded_store(vec![post(1, "Um", 1)]);
    let remote = FakeRemote::new();
    let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
    let planner = Planner::new(&store, &remote, &paths);
    planner
        .attach_post_file(AGENCY, 1, "clip.mov", png(50, 50))
        .await
        .unwrap();

    let temp = tempdir().unwrap();
    let mut renderer = MockPdfRenderer::new();
    renderer
        .expect_render()
        .returning(|_| Err(RenderError::Layout("boom".into())));
    let normalizer = normalizer();
    let report = CampaignReport::new(
        &planner,
        &normalizer,
        &renderer,
        ReportConfig::default(),
    )
    .with_temp_dir(temp.path());

    assert!(report.build(AGENCY, CAMPAIGN).await.is_err());
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_publish_uploads_pdf_and_records_link() {
    let store = seeded_store(vec![post(1, "Um", 1)]);
    let remote = FakeRemote::new();
    let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
    let planner = Planner::new(&store, &remote, &paths);

    let mut renderer = MockPdfRenderer::new();
    renderer.expect_render().returning(|_| Ok(b"%PDF".to_vec()));
    let normalizer = normalizer();
    let report = CampaignReport::new(
        &planner,
        &normalizer,
        &renderer,
        ReportConfig::default(),
    );

    let published = report
        .publish(AGENCY, CAMPAIGN)
        .await
        .unwrap()
        .expect("upload should succeed");
    let expected_path =
        "/AgencyOS/CLIENTES/padaria-sao-joao/2025/03 - MARCO/marco-cafe/Cronograma_marco-cafe.pdf";
    assert_eq!(published.path, expected_path);
    assert!(published.link.ends_with("?raw=1"));
    assert!(remote.has_file(expected_path));

    let campaign = store.campaign(CAMPAIGN).await.unwrap().unwrap();
    assert_eq!(campaign.pdf_path.as_deref(), Some(expected_path));
    assert_eq!(campaign.pdf_link, Some(published.link));

    remote.fail_everything(true);
    assert!(report.publish(AGENCY, CAMPAIGN).await.unwrap().is_none());
}

#[tokio::test]
async fn test_real_renderer_embeds_video_thumbnails() {
    let store = seeded_store(vec![post(1, "Um", 1), post(2, "Dois", 2)]);
    let remote = FakeRemote::new();
    let paths = PathBuilder::new("/AgencyOS", SegmentPolicy::Slug);
    let planner = Planner::new(&store, &remote, &paths);
    planner
        .attach_post_file(AGENCY, 1, "clip.mp4", png(900, 600))
        .await
        .unwrap()
        .expect("attachment should upload");

    let temp = tempdir().unwrap();
    let normalizer = normalizer();
    let renderer = PrintPdfRenderer;
    let report = CampaignReport::new(&planner, &normalizer, &renderer, ReportConfig::default())
        .with_temp_dir(temp.path());

    let pdf = report.build(AGENCY, CAMPAIGN).await.expect("report should build");
    assert!(pdf.starts_with(b"%PDF"));
    assert!(
        pdf.windows(b"/Image".len()).any(|w| w == b"/Image"),
        "thumbnail must be embedded as an image XObject"
    );
    assert!(dir_is_empty(temp.path()));
}
