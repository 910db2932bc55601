//! The asset client against a real HTTP server.

use std::sync::Arc;
use std::time::Duration;

use pillbox_core::api::ItemType;
use pillbox_core::{
    AssetApi, AssetKind, CachedGroupResolver, HttpFetcher, ResourceCache, Tag, TagCollection,
    serialize,
};
use pillbox_test_utils::images::png;
use pillbox_test_utils::tracing_setup::init_test_tracing;
use pillbox_test_utils::{FixtureServer, Fixtures};
use pretty_assertions::assert_eq;
use serde_json::json;

fn client(server: &FixtureServer) -> AssetApi {
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    AssetApi::new(ResourceCache::new(Arc::new(fetcher)), &server.base_url()).unwrap()
}

fn fixtures() -> Fixtures {
    Fixtures::new()
        .folder("loras", "", "styles")
        .file("loras", "", "detail tweaker", ".safetensors")
        .file("loras", "styles", "ink wash", ".safetensors")
        .file("loras", "styles", "oil paint", ".safetensors")
        .tag("blue_sky", 900)
        .tag("blue_eyes", 1200)
        .tag("red_sky", 40)
        .group(
            "look.json",
            json!([
                {"name": "tagC", "type": "tag"},
                {"name": "tagD", "type": "tag", "active": false}
            ]),
        )
        .metadata(
            "styles/ink wash.safetensors",
            json!({"ss_tag_frequency": "{\"set\": {\"ink\": 12, \"wash\": 3}}"}),
        )
        .preview("loras", "styles/ink wash", png(64, 32))
}

#[tokio::test]
async fn test_browse_root_and_folder() {
    init_test_tracing();
    let server = FixtureServer::start(fixtures()).await;
    let api = client(&server);

    let root = api.search_files(AssetKind::Lora, "", "").await.unwrap();
    assert_eq!(root.current_path, "");
    assert_eq!(root.parent_path, None);
    assert_eq!(root.items[0].item_type, ItemType::Folder);

    let styles = api
        .search_files(AssetKind::Lora, "styles", "ink")
        .await
        .unwrap();
    assert_eq!(styles.parent_path.as_deref(), Some(""));
    let names: Vec<&str> = styles.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["ink wash"]);
}

#[tokio::test]
async fn test_tag_search_honours_limit() {
    let server = FixtureServer::start(fixtures()).await;
    let api = client(&server);

    let results = api.search_tags("sky", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "blue_sky");
}

#[tokio::test]
async fn test_missing_metadata_is_fetched_once() {
    let server = FixtureServer::start(fixtures()).await;
    let api = client(&server);

    assert_eq!(api.lora_metadata("nothing.safetensors").await.unwrap(), None);
    assert_eq!(api.lora_metadata("nothing.safetensors").await.unwrap(), None);
    assert_eq!(
        server.state().hits("/pillbox/metadata/nothing.safetensors"),
        1
    );

    let found = api
        .lora_metadata("styles/ink wash.safetensors")
        .await
        .unwrap()
        .unwrap();
    let words = pillbox_core::api::trigger_words(&found, 8);
    assert_eq!(words[0], ("ink".to_string(), 12));
}

#[tokio::test]
async fn test_saved_group_is_visible_to_a_fresh_client() {
    let server = FixtureServer::start(fixtures()).await;
    let writer = client(&server);
    let members = TagCollection::from_tags([Tag::plain("soft light"), Tag::plain("bokeh")]);
    writer.save_group("portraits/soft.json", &members).await.unwrap();

    let reader = client(&server);
    let loaded = reader.group("portraits/soft", None).await.unwrap();
    assert_eq!(loaded, members);
}

#[tokio::test]
async fn test_serialize_expands_groups_over_http() {
    let server = FixtureServer::start(fixtures()).await;
    let resolver = CachedGroupResolver::new(client(&server));
    let collection = TagCollection::from_tags([
        Tag::plain("tagA"),
        Tag::group("look").with_strength(0.8),
        Tag::group("absent"),
        Tag::plain("tagB"),
    ]);

    let text = serialize(&collection, ", ", &resolver).await;
    assert_eq!(text, "tagA, (tagC:0.80), tagB");
}

#[tokio::test]
async fn test_preview_decode_and_replace() {
    let server = FixtureServer::start(fixtures()).await;
    let api = client(&server);

    let image = api
        .preview(AssetKind::Lora, "styles/ink wash")
        .await
        .unwrap()
        .unwrap();
    assert_eq!((image.width(), image.height()), (64, 32));
    assert!(api.preview(AssetKind::Lora, "oil paint").await.unwrap().is_none());

    api.upload_preview(AssetKind::Lora, "styles/ink wash", png(16, 16))
        .await
        .unwrap();
    let image = api
        .preview(AssetKind::Lora, "styles/ink wash")
        .await
        .unwrap()
        .unwrap();
    assert_eq!((image.width(), image.height()), (16, 16));
    assert_eq!(
        server.state().preview("loras", "styles/ink wash"),
        Some(png(16, 16))
    );
}
