//! End-to-end player flows against a scriptable fake host and fake remote
//! sources. Timing-sensitive tests run on the paused tokio clock.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, sleep, timeout};

use nowplaying::api::{
    LyricsTransformer, ProviderLyrics, ProviderLyricsSource, TrackInformation,
    TrackInformationSource, TransformedLyrics,
};
use nowplaying::cache::ExpireStore;
use nowplaying::host::{
    HostEvent, HostPlayer, ItemKind, ItemMetadata, PlayerData, PlayerItem,
};
use nowplaying::player::{
    LoopMode, Player, PROVIDER_LYRICS_STORE, STORE_VERSION, TRANSFORMED_LYRICS_STORE,
};

struct FakeHost {
    data: Mutex<Option<PlayerData>>,
    heart: AtomicBool,
    shuffle: AtomicBool,
    repeat: AtomicU8,
    position_ms: AtomicU64,
    position_calls: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl FakeHost {
    fn new(data: Option<PlayerData>) -> Self {
        Self {
            data: Mutex::new(data),
            heart: AtomicBool::new(false),
            shuffle: AtomicBool::new(false),
            repeat: AtomicU8::new(0),
            position_ms: AtomicU64::new(0),
            position_calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn set_data(&self, data: Option<PlayerData>) {
        *self.data.lock().unwrap() = data;
    }

    fn set_paused(&self, is_paused: bool) {
        if let Some(data) = self.data.lock().unwrap().as_mut() {
            data.is_paused = is_paused;
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: String) {
        self.commands.lock().unwrap().push(command);
    }
}

#[async_trait]
impl HostPlayer for FakeHost {
    fn data(&self) -> Option<PlayerData> {
        self.data.lock().unwrap().clone()
    }

    fn get_heart(&self) -> bool {
        self.heart.load(Ordering::SeqCst)
    }

    fn get_shuffle(&self) -> bool {
        self.shuffle.load(Ordering::SeqCst)
    }

    fn get_repeat(&self) -> u8 {
        self.repeat.load(Ordering::SeqCst)
    }

    async fn set_heart(&self, liked: bool) -> Result<()> {
        self.record(format!("heart:{liked}"));
        Ok(())
    }

    async fn set_shuffle(&self, shuffling: bool) -> Result<()> {
        self.record(format!("shuffle:{shuffling}"));
        Ok(())
    }

    async fn set_repeat(&self, repeat: u8) -> Result<()> {
        self.record(format!("repeat:{repeat}"));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play".into());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".into());
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.record(format!("seek:{position_ms}"));
        Ok(())
    }

    async fn position(&self) -> Result<u64> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.position_ms.load(Ordering::SeqCst))
    }
}

struct FakeTrackSource {
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeTrackSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

fn information_for(track_id: &str) -> TrackInformation {
    serde_json::from_value(serde_json::json!({
        "name": format!("Song {track_id} - Remastered 2011"),
        "external_ids": { "isrc": format!("ISRC{track_id}") },
        "artists": [{ "id": "artist1", "name": "Artist" }],
        "album": {
            "id": "album1",
            "album_type": "album",
            "artists": [{ "id": "artist1", "name": "Artist" }],
            "release_date": "2011-06-01"
        }
    }))
    .unwrap()
}

#[async_trait]
impl TrackInformationSource for FakeTrackSource {
    async fn track_information(&self, track_id: &str) -> Result<TrackInformation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            sleep(self.delay).await;
        }
        Ok(information_for(track_id))
    }
}

struct FakeLyricsSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderLyricsSource for FakeLyricsSource {
    async fn provider_lyrics(&self, track_id: &str) -> Result<Option<ProviderLyrics>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ProviderLyrics(serde_json::json!({
            "track": track_id,
            "lines": ["la la la"]
        }))))
    }
}

struct FakeTransformer {
    calls: AtomicUsize,
}

#[async_trait]
impl LyricsTransformer for FakeTransformer {
    async fn transform(&self, lyrics: &ProviderLyrics) -> Result<TransformedLyrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransformedLyrics(serde_json::json!({
            "transformed": lyrics.0
        })))
    }
}

fn track_data(uri: &str, is_local: bool, is_paused: bool) -> PlayerData {
    PlayerData {
        item: Some(PlayerItem {
            kind: ItemKind::Track,
            uri: uri.into(),
            metadata: ItemMetadata {
                is_local,
                image_url: "default.jpg".into(),
                image_small_url: "small.jpg".into(),
                image_large_url: "big.jpg".into(),
                image_xlarge_url: "xlarge.jpg".into(),
            },
        }),
        duration_ms: 200_000,
        is_paused,
    }
}

struct Fixture {
    player: Player,
    host: Arc<FakeHost>,
    tracks: Arc<FakeTrackSource>,
    lyrics: Arc<FakeLyricsSource>,
    transformer: Arc<FakeTransformer>,
    events: UnboundedSender<HostEvent>,
    receiver: Option<UnboundedReceiver<HostEvent>>,
    cache_dir: tempfile::TempDir,
}

impl Fixture {
    fn new(data: Option<PlayerData>) -> Self {
        Self::with_sources(data, Arc::new(FakeTrackSource::new()))
    }

    fn with_sources(data: Option<PlayerData>, tracks: Arc<FakeTrackSource>) -> Self {
        let host = Arc::new(FakeHost::new(data));
        let lyrics = Arc::new(FakeLyricsSource {
            calls: AtomicUsize::new(0),
        });
        let transformer = Arc::new(FakeTransformer {
            calls: AtomicUsize::new(0),
        });
        let cache_dir = tempfile::tempdir().unwrap();
        let player = Player::with_cache_dir(
            host.clone(),
            tracks.clone(),
            lyrics.clone(),
            transformer.clone(),
            cache_dir.path(),
        );
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            player,
            host,
            tracks,
            lyrics,
            transformer,
            events,
            receiver: Some(receiver),
            cache_dir,
        }
    }

    fn start(&mut self) {
        let receiver = self.receiver.take().expect("already started");
        self.player.start(receiver);
    }
}

async fn expect_signal<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> T {
    timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("signal channel closed")
}

#[tokio::test(start_paused = true)]
async fn song_change_loads_details_and_lyrics() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let mut song_changed = fixture.player.signals().song_changed.subscribe();
    let mut details_loaded = fixture.player.signals().song_details_loaded.subscribe();
    let mut lyrics_loaded = fixture.player.signals().song_lyrics_loaded.subscribe();

    fixture.start();
    expect_signal(&mut song_changed).await;
    expect_signal(&mut details_loaded).await;
    expect_signal(&mut lyrics_loaded).await;

    let song = fixture.player.song().await.unwrap();
    assert_eq!(song.id, "trackA");
    assert_eq!(song.duration, 200.0);
    assert_eq!(fixture.player.timestamp().await, 0.0);

    let details = fixture.player.song_details().await.unwrap();
    assert_eq!(details.name, "Song trackA");
    assert_eq!(details.isrc, "ISRCtrackA");
    assert!(fixture.player.have_song_details_loaded().await);

    assert!(fixture.player.song_lyrics().await.is_some());
    assert!(fixture.player.have_song_lyrics_loaded().await);

    assert_eq!(fixture.tracks.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.lyrics.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.transformer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn replaying_a_song_resolves_from_the_caches() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let mut details_loaded = fixture.player.signals().song_details_loaded.subscribe();
    let mut lyrics_loaded = fixture.player.signals().song_lyrics_loaded.subscribe();

    fixture.start();
    expect_signal(&mut details_loaded).await;
    expect_signal(&mut lyrics_loaded).await;

    fixture.events.send(HostEvent::SongChange).unwrap();
    expect_signal(&mut details_loaded).await;
    expect_signal(&mut lyrics_loaded).await;

    assert_eq!(fixture.tracks.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.lyrics.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.transformer.calls.load(Ordering::SeqCst), 1);
    assert!(fixture.player.song_details().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn local_songs_short_circuit_without_remote_calls() {
    let mut fixture = Fixture::new(Some(track_data("spotify:local:Artist:Album:Song:215", true, true)));
    let mut details_loaded = fixture.player.signals().song_details_loaded.subscribe();
    let mut lyrics_loaded = fixture.player.signals().song_lyrics_loaded.subscribe();

    fixture.start();
    expect_signal(&mut details_loaded).await;
    expect_signal(&mut lyrics_loaded).await;

    let song = fixture.player.song().await.unwrap();
    assert!(song.is_local);
    assert_eq!(song.id, "Artist:Album:Song:215");

    let details = fixture.player.song_details().await.unwrap();
    assert_eq!(details.name, "");
    assert!(details.raw.is_none());
    assert!(fixture.player.song_lyrics().await.is_none());
    assert!(fixture.player.have_song_lyrics_loaded().await);

    assert_eq!(fixture.tracks.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.lyrics.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.transformer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn details_from_an_overtaken_load_are_discarded() {
    let tracks = Arc::new(FakeTrackSource::with_delay(Duration::from_millis(200)));
    let mut fixture =
        Fixture::with_sources(Some(track_data("spotify:track:trackA", false, true)), tracks);
    let mut details_loaded = fixture.player.signals().song_details_loaded.subscribe();
    let mut song_changed = fixture.player.signals().song_changed.subscribe();

    fixture.start();
    expect_signal(&mut song_changed).await;

    // A second song arrives while the first details fetch is still in flight.
    fixture
        .host
        .set_data(Some(track_data("spotify:track:trackB", false, true)));
    fixture.events.send(HostEvent::SongChange).unwrap();
    expect_signal(&mut song_changed).await;

    expect_signal(&mut details_loaded).await;
    let details = fixture.player.song_details().await.unwrap();
    assert_eq!(details.name, "Song trackB");

    // Only the second song's result may ever be visible.
    sleep(Duration::from_millis(500)).await;
    let details = fixture.player.song_details().await.unwrap();
    assert_eq!(details.name, "Song trackB");
}

#[tokio::test(start_paused = true)]
async fn cached_absent_lyrics_block_the_network() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));

    // A previous run learned this track has no lyrics.
    let seed: ExpireStore<Option<TransformedLyrics>> = ExpireStore::with_cache_dir(
        TRANSFORMED_LYRICS_STORE,
        STORE_VERSION,
        chrono::Duration::days(30),
        fixture.cache_dir.path(),
    );
    seed.set("trackA", None).await;

    let mut lyrics_loaded = fixture.player.signals().song_lyrics_loaded.subscribe();
    fixture.start();
    expect_signal(&mut lyrics_loaded).await;

    assert!(fixture.player.song_lyrics().await.is_none());
    assert!(fixture.player.have_song_lyrics_loaded().await);
    assert_eq!(fixture.lyrics.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.transformer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cached_absent_provider_lyrics_skip_network_and_transform() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));

    // A previous run learned the provider has nothing for this track.
    let seed: ExpireStore<Option<ProviderLyrics>> = ExpireStore::with_cache_dir(
        PROVIDER_LYRICS_STORE,
        STORE_VERSION,
        chrono::Duration::days(30),
        fixture.cache_dir.path(),
    );
    seed.set("trackA", None).await;

    let mut lyrics_loaded = fixture.player.signals().song_lyrics_loaded.subscribe();
    fixture.start();
    expect_signal(&mut lyrics_loaded).await;

    assert!(fixture.player.song_lyrics().await.is_none());
    assert!(fixture.player.have_song_lyrics_loaded().await);
    assert_eq!(fixture.lyrics.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.transformer.calls.load(Ordering::SeqCst), 0);

    // The derived absence lands in the transformed store as a sentinel.
    let stage_two: ExpireStore<Option<TransformedLyrics>> = ExpireStore::with_cache_dir(
        TRANSFORMED_LYRICS_STORE,
        STORE_VERSION,
        chrono::Duration::days(30),
        fixture.cache_dir.path(),
    );
    stage_two.load_from_disk().await.unwrap();
    assert_eq!(stage_two.get("trackA").await, Some(None));
}

#[tokio::test(start_paused = true)]
async fn superseded_deferred_song_changes_apply_once() {
    let mut fixture = Fixture::new(None);
    let mut song_changed = fixture.player.signals().song_changed.subscribe();

    fixture.start();
    fixture.events.send(HostEvent::SongChange).unwrap();
    fixture.events.send(HostEvent::SongChange).unwrap();
    sleep(Duration::from_millis(200)).await;

    fixture
        .host
        .set_data(Some(track_data("spotify:track:trackA", false, true)));
    expect_signal(&mut song_changed).await;
    assert_eq!(fixture.player.song().await.unwrap().id, "trackA");

    // Only the latest pending notification may apply.
    sleep(Duration::from_millis(500)).await;
    assert!(song_changed.try_recv().is_err());
}

#[tokio::test]
async fn matching_commands_are_swallowed_and_mismatched_ones_forward() {
    let fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let player = &fixture.player;

    player.set_is_playing(false).await.unwrap();
    player.set_is_liked(false).await.unwrap();
    player.set_is_shuffling(false).await.unwrap();
    assert_eq!(fixture.host.commands(), Vec::<String>::new());

    player.set_is_playing(true).await.unwrap();
    player.set_is_liked(true).await.unwrap();
    player.set_is_shuffling(true).await.unwrap();
    // Loop mode and seek always forward, even when nothing changes.
    player.set_loop_mode(LoopMode::Off).await.unwrap();
    player.seek_to(12.0).await.unwrap();

    assert_eq!(
        fixture.host.commands(),
        vec!["play", "heart:true", "shuffle:true", "repeat:0", "seek:12000"]
    );
}

#[tokio::test(start_paused = true)]
async fn liked_fires_on_first_observation_even_when_false() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let mut liked_changed = fixture.player.signals().is_liked_changed.subscribe();
    let mut shuffle_changed = fixture.player.signals().is_shuffling_changed.subscribe();
    let mut song_changed = fixture.player.signals().song_changed.subscribe();

    fixture.start();
    // Initial reconciliation observes liked=false for the first time.
    expect_signal(&mut liked_changed).await;
    assert!(!fixture.player.is_liked().await);
    expect_signal(&mut song_changed).await;

    // The song change reset the loaded flag, so the next update fires again.
    fixture.events.send(HostEvent::Update).unwrap();
    expect_signal(&mut liked_changed).await;

    // Now loaded and unchanged: a further update stays silent. The shuffle
    // flip proves the update was processed.
    fixture.host.shuffle.store(true, Ordering::SeqCst);
    fixture.events.send(HostEvent::Update).unwrap();
    expect_signal(&mut shuffle_changed).await;
    assert!(liked_changed.try_recv().is_err());
    assert!(fixture.player.has_is_liked_loaded().await);
}

#[tokio::test(start_paused = true)]
async fn update_events_fire_only_for_changed_flags() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let mut shuffle_changed = fixture.player.signals().is_shuffling_changed.subscribe();
    let mut loop_changed = fixture.player.signals().loop_mode_changed.subscribe();

    fixture.start();

    fixture.host.repeat.store(2, Ordering::SeqCst);
    fixture.events.send(HostEvent::Update).unwrap();
    expect_signal(&mut loop_changed).await;
    assert_eq!(fixture.player.loop_mode().await, LoopMode::Song);
    assert!(shuffle_changed.try_recv().is_err());
    assert!(!fixture.player.is_shuffling().await);
}

#[tokio::test(start_paused = true)]
async fn pausing_cancels_the_poll_chain_and_playing_restarts_one() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, false)));
    let mut playing_changed = fixture.player.signals().is_playing_changed.subscribe();

    fixture.start();
    expect_signal(&mut playing_changed).await;
    assert!(fixture.player.is_playing().await);

    // The chain is cycling: steps arrive while playing.
    let mut steps = fixture.player.signals().time_stepped.subscribe();
    let step = expect_signal(&mut steps).await;
    assert_eq!(step.skipped, None);
    assert!(step.delta_time > 0.0);

    fixture.host.set_paused(true);
    fixture.events.send(HostEvent::PlayPause).unwrap();
    expect_signal(&mut playing_changed).await;
    assert!(!fixture.player.is_playing().await);

    // Let any in-flight cycle drain, then confirm polling has stopped.
    sleep(Duration::from_millis(200)).await;
    let stalled = fixture.host.position_calls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(fixture.host.position_calls.load(Ordering::SeqCst), stalled);

    // Resuming starts exactly one fresh chain: the cycle count over a fixed
    // window matches a single 50ms cadence.
    fixture.host.set_paused(false);
    fixture.events.send(HostEvent::PlayPause).unwrap();
    expect_signal(&mut playing_changed).await;

    let before = fixture.host.position_calls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(500)).await;
    let cycles = fixture.host.position_calls.load(Ordering::SeqCst) - before;
    assert!((8..=12).contains(&cycles), "cycles in window: {cycles}");
}

#[tokio::test(start_paused = true)]
async fn song_change_defers_until_the_host_has_data() {
    let mut fixture = Fixture::new(None);
    let mut song_changed = fixture.player.signals().song_changed.subscribe();

    fixture.start();
    sleep(Duration::from_millis(200)).await;
    assert!(fixture.player.song().await.is_none());

    fixture
        .host
        .set_data(Some(track_data("spotify:track:trackA", false, true)));
    expect_signal(&mut song_changed).await;
    assert_eq!(fixture.player.song().await.unwrap().id, "trackA");
}

#[tokio::test(start_paused = true)]
async fn non_track_items_clear_the_song() {
    let mut fixture = Fixture::new(Some(track_data("spotify:track:trackA", false, true)));
    let mut song_changed = fixture.player.signals().song_changed.subscribe();
    let mut details_loaded = fixture.player.signals().song_details_loaded.subscribe();

    fixture.start();
    expect_signal(&mut song_changed).await;
    expect_signal(&mut details_loaded).await;

    let mut episode = track_data("spotify:episode:ep1", false, true);
    if let Some(item) = episode.item.as_mut() {
        item.kind = ItemKind::Episode;
    }
    fixture.host.set_data(Some(episode));
    fixture.events.send(HostEvent::SongChange).unwrap();
    expect_signal(&mut song_changed).await;
    expect_signal(&mut details_loaded).await;

    assert!(fixture.player.song().await.is_none());
    assert!(fixture.player.song_details().await.is_none());
    assert!(fixture.player.have_song_details_loaded().await);
}
