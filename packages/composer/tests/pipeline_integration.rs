//! End-to-end pipeline tests against scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use composer::limiter::{RetryExecutor, RetryPolicy};
use composer::pipeline::{ComposeDeps, ContentPipeline};
use composer::testing::{
    hit, MockAssetStore, MockImageGenerator, MockLogSink, MockPublisher, MockSearch,
    MockTextGenerator,
};
use composer::types::LogLevel;
use composer::{ComposeConfig, ComposeError, ImageStrategy};

fn fast_gate(resource: &'static str) -> Arc<RetryExecutor> {
    Arc::new(RetryExecutor::with_policy(
        resource,
        3,
        Duration::from_millis(1),
        RetryPolicy {
            max_attempts: 2,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        },
    ))
}

/// Three-section outline and matching body, with ranking scripted to
/// always pick the first candidate.
fn scripted_text() -> MockTextGenerator {
    MockTextGenerator::new()
        .with_reply(
            "planning a blog post",
            r#"{"title":"Growing Basil","sections":[
                {"title":"Alpha","summary":"first","target_words":200},
                {"title":"Beta","summary":"second","target_words":200},
                {"title":"Gamma","summary":"third","target_words":200}
            ]}"#,
        )
        .with_reply(
            "Write the blog post",
            r#"{"sections":["<p>alpha body</p>","<p>beta body</p>","<p>gamma body</p>"],
                "meta":{"seo_title":"Growing Basil","seo_description":"a guide",
                        "tags":["gardening"],"thumbnail_captions":["Basil on a sill"]}}"#,
        )
        .with_reply("Candidates", r#"{"best":0}"#)
}

struct Harness {
    text: Arc<MockTextGenerator>,
    search: Arc<MockSearch>,
    assets: Arc<MockAssetStore>,
    publisher: Arc<MockPublisher>,
    logs: Arc<MockLogSink>,
    pipeline: ContentPipeline,
}

fn harness(
    text: MockTextGenerator,
    image: MockImageGenerator,
    search: MockSearch,
    assets: MockAssetStore,
    publisher: MockPublisher,
    config: ComposeConfig,
) -> Harness {
    let text = Arc::new(text);
    let search = Arc::new(search);
    let assets = Arc::new(assets);
    let publisher = Arc::new(publisher);
    let logs = Arc::new(MockLogSink::new());

    let deps = ComposeDeps {
        text: text.clone(),
        image: Arc::new(image),
        search: search.clone(),
        assets: assets.clone(),
        publisher: publisher.clone(),
        logs: logs.clone(),
        gen_gate: fast_gate("generation"),
        search_gate: fast_gate("search"),
    };

    Harness {
        text,
        search,
        assets,
        publisher,
        logs,
        pipeline: ContentPipeline::new(deps, config),
    }
}

fn links_only_config() -> ComposeConfig {
    let mut config = ComposeConfig::default();
    config.related_videos = false;
    config
}

fn bare_config() -> ComposeConfig {
    let mut config = ComposeConfig::default();
    config.related_links = false;
    config.related_videos = false;
    config
}

#[tokio::test]
async fn failed_section_enrichment_does_not_leak_into_neighbors() {
    let search = MockSearch::new()
        .with_hits("Alpha", vec![hit("Alpha guide", "https://a.example/guide")])
        .fail_on("Beta")
        .with_hits("Gamma", vec![hit("Gamma notes", "https://g.example/notes")]);

    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        search,
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/7"),
        links_only_config(),
    );

    let result = h.pipeline.run(Uuid::new_v4(), &brief()).await;
    assert!(result.is_ok());

    let published = h.publisher.published();
    let html = &published[0].html;
    assert!(html.contains("https://a.example/guide"));
    assert!(html.contains("https://g.example/notes"));
    assert!(!html.contains("b.example"));

    let errors = h.logs.messages_at(LogLevel::Error);
    assert!(
        errors
            .iter()
            .any(|m| m.starts_with("section 1: related link degraded")),
        "expected a degraded log for section 1, got {errors:?}"
    );
}

#[tokio::test]
async fn first_section_never_carries_an_ad() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/8"),
        bare_config().with_ads("<script>ad</script>"),
    );

    h.pipeline.run(Uuid::new_v4(), &brief()).await.unwrap();

    let published = h.publisher.published();
    let html = &published[0].html;
    assert_eq!(html.matches("class=\"ad\"").count(), 2);

    // No ad between the start of section 0 and the start of section 1.
    let s0 = html.find("data-index=\"0\"").unwrap();
    let s1 = html.find("data-index=\"1\"").unwrap();
    let first_ad = html.find("class=\"ad\"").unwrap();
    assert!(first_ad > s1 && first_ad > s0);
}

#[tokio::test]
async fn empty_ad_script_suppresses_ads_even_when_enabled() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/9"),
        bare_config().with_ads(""),
    );

    h.pipeline.run(Uuid::new_v4(), &brief()).await.unwrap();
    assert_eq!(h.publisher.published()[0].html.matches("class=\"ad\"").count(), 0);
}

#[tokio::test]
async fn generated_images_are_uploaded_under_the_job_prefix() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![0x89, 0x50, 0x4e, 0x47]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/10"),
        bare_config().with_image_strategy(ImageStrategy::Generate),
    );

    let job_id = Uuid::new_v4();
    h.pipeline.run(job_id, &brief()).await.unwrap();

    let uploads = h.assets.uploads();
    assert_eq!(uploads.len(), 3);
    assert!(uploads.iter().all(|key| key.starts_with(&format!("{job_id}/"))));

    let html = &h.publisher.published()[0].html;
    assert!(html.contains(&format!("https://assets.test/{job_id}/section-0.png")));
}

#[tokio::test]
async fn publish_failure_after_uploads_deletes_the_job_prefix() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![1, 2, 3]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/11").failing_first(10),
        bare_config().with_image_strategy(ImageStrategy::Generate),
    );

    let job_id = Uuid::new_v4();
    let err = h.pipeline.run(job_id, &brief()).await.unwrap_err();
    assert!(matches!(err, ComposeError::Publish(_)));

    assert!(!h.assets.uploads().is_empty());
    assert_eq!(h.assets.deleted_prefixes(), vec![format!("{job_id}/")]);
    assert!(h.assets.remaining_keys().is_empty());
}

#[tokio::test]
async fn publish_failure_without_uploads_skips_compensation() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/12").failing_first(10),
        bare_config(),
    );

    let err = h.pipeline.run(Uuid::new_v4(), &brief()).await.unwrap_err();
    assert!(matches!(err, ComposeError::Publish(_)));
    assert!(h.assets.deleted_prefixes().is_empty());
}

#[tokio::test]
async fn rerunning_a_failed_job_restarts_from_the_outline() {
    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        MockSearch::new(),
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/13").failing_first(1),
        bare_config(),
    );

    let job_id = Uuid::new_v4();
    assert!(h.pipeline.run(job_id, &brief()).await.is_err());
    // Outline + body per run, nothing else with enrichment disabled.
    assert_eq!(h.text.call_count(), 2);

    let result = h.pipeline.run(job_id, &brief()).await.unwrap();
    assert_eq!(h.text.call_count(), 4);
    assert_eq!(result.result_url, "https://blog.example/p/13");
}

#[tokio::test]
async fn video_enrichment_only_embeds_playable_candidates() {
    let search = MockSearch::new().with_hits(
        "Alpha",
        vec![
            hit("Not a video", "https://a.example/page"),
            hit("Basil video", "https://www.youtube.com/watch?v=basil42"),
        ],
    );

    let mut config = bare_config();
    config.related_videos = true;

    let h = harness(
        scripted_text(),
        MockImageGenerator::new(vec![]),
        search,
        MockAssetStore::new(),
        MockPublisher::new("https://blog.example/p/14"),
        config,
    );

    h.pipeline.run(Uuid::new_v4(), &brief()).await.unwrap();

    let html = &h.publisher.published()[0].html;
    assert!(html.contains("youtube.com/embed/basil42"));
    assert!(!html.contains("a.example/page"));
    // The video search actually went out for every section.
    assert!(h.search.queries().len() >= 3);
}

fn brief() -> composer::types::Brief {
    composer::types::Brief {
        title: "Growing Basil".into(),
        brief: "A practical guide to growing basil indoors".into(),
    }
}
