use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use photo2persona::core::config::Config;
use photo2persona::core::io::{NativeStorage, Storage};
use photo2persona::core::state::{GeneratedImage, ImageKind};
use photo2persona::services::image_gen::{create_image_generator, ImageGenerator};
use photo2persona::services::images::GenerationRun;
use photo2persona::services::llm::{create_llm, LlmClient};
use photo2persona::services::prompts::synth::PROMPT_COUNT;
use photo2persona::services::selection::{AutoSelector, InteractiveSelector, Selector};
use photo2persona::services::video_gen::{create_video_animator, VideoAnimator, VideoJob};
use photo2persona::services::voice::elevenlabs::{create_voice_client, SpeechSynthesizer, VoiceCatalog};
use photo2persona::services::voice::VoiceLibrary;
use photo2persona::services::wizard::{VoicePreview, Wizard, WizardServices};
use photo2persona::utils::image::InlineImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let image_path = std::env::args()
        .nth(1)
        .context("Usage: photo2persona <photo>")?;

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid provider settings.");
            return Err(e);
        }
    };
    config.ensure_directories()?;
    let config = Arc::new(config);

    let services = build_services(&config);
    let voices = services.voices.clone();
    // warm the voice library while the photo is analysed
    {
        let voices = voices.clone();
        tokio::spawn(async move {
            voices.get_voices(false).await;
        });
    }

    let selector: Box<dyn Selector> = if config.unattended {
        Box::new(AutoSelector)
    } else {
        Box::new(InteractiveSelector)
    };

    let mut wizard = Wizard::new(config.clone(), services);
    wizard.upload_image(InlineImage::from_path(Path::new(&image_path)).await?);

    // 1. Tags
    println!("Step 1/4: Analysing photo...");
    let candidates = wizard.recommend_tags().await?;
    let recommended = wizard.draft().recommended_labels.clone();
    println!("Recommended: {}", recommended.join(", "));
    let ids = selector.pick_tags(&candidates, &recommended)?;
    wizard.select_tags(&ids);

    // 2. Styles
    println!("Step 2/4: Generating styles...");
    let mut run = generate_with_progress(&mut wizard, false).await?;
    while selector.confirm_regenerate()? {
        run = generate_with_progress(&mut wizard, true).await?;
    }
    println!(
        "{}/{} styles generated in {:.1}s{}",
        run.success_count,
        run.total_count,
        run.duration_ms as f64 / 1000.0,
        if run.is_mock { " (provider unavailable, showing copies)" } else { "" }
    );
    let slot = selector.pick_style(&wizard.draft().images)?;
    wizard.select_style(slot)?;

    // 3. Voice
    println!("Step 3/4: Matching a voice...");
    let rec = wizard.match_voice().await?;
    println!("Recommended voice: {} ({})", rec.voice_id, rec.reasoning);
    let catalog = wizard.voices().await;
    let status = voices.status();
    println!(
        "Voice library: {} voices ({} official, {} community)",
        status.count, status.official_count, status.community_count
    );
    let voice_id = selector.pick_voice(&catalog, &rec.voice_id)?;
    wizard.select_voice(&voice_id).await?;
    match wizard.preview_voice(&voice_id).await {
        Ok(VoicePreview::Url(url)) => println!("Voice sample: {}", url),
        Ok(VoicePreview::File(path)) => println!("Voice sample saved to {}", path),
        Err(e) => warn!("No voice preview: {:#}", e),
    }

    // 4. Preview
    println!("Step 4/4: Directing the intro video...");
    let direction = wizard.direct_video().await?;
    if let Some(name) = &direction.suggested_name {
        println!("Name: {}", name);
    }
    println!("Script ({}): {}", direction.script_id, direction.script_text);
    println!("Motion: {}", direction.motion_prompt);
    match wizard.animate_preview().await? {
        Some(VideoJob::Ready(url)) => println!("Video: {}", url),
        Some(VideoJob::Queued(task)) => println!("Video queued as task {}", task),
        None => {}
    }

    let summary = wizard.finish().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Providers that fail to build are left out; their stages use defaults.
fn build_services(config: &Config) -> WizardServices {
    let llm: Option<Arc<dyn LlmClient>> = match create_llm(config) {
        Ok(llm) => Some(Arc::from(llm)),
        Err(e) => {
            warn!("LLM unavailable, recommendations will use defaults: {:#}", e);
            None
        }
    };
    let image_generator: Option<Arc<dyn ImageGenerator>> = match create_image_generator(config) {
        Ok(g) => Some(Arc::from(g)),
        Err(e) => {
            warn!("Image generator unavailable, styles will be copies: {:#}", e);
            None
        }
    };
    let voice_client = match create_voice_client(&config.voice) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Voice provider unavailable, using bundled voices: {:#}", e);
            None
        }
    };
    let animator: Option<Arc<dyn VideoAnimator>> = match create_video_animator(config) {
        Ok(a) => a.map(Arc::from),
        Err(e) => {
            warn!("Video backend unavailable: {:#}", e);
            None
        }
    };

    let catalog = voice_client
        .clone()
        .map(|c| c as Arc<dyn VoiceCatalog>);
    let speech = voice_client.map(|c| c as Arc<dyn SpeechSynthesizer>);
    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());

    WizardServices {
        llm,
        image_generator,
        voices: Arc::new(VoiceLibrary::new(
            catalog,
            config.voice.collection.clone(),
            Duration::from_secs(config.voice.cache_ttl_seconds),
        )),
        speech,
        animator,
        storage,
    }
}

async fn generate_with_progress(wizard: &mut Wizard, regenerate: bool) -> Result<GenerationRun> {
    let pb = ProgressBar::new(PROMPT_COUNT as u64 + 1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let on_ready = |img: &GeneratedImage| {
        let detail = match img.kind {
            ImageKind::Error => img.error.clone().unwrap_or_default(),
            ImageKind::Original => "original".to_string(),
            _ => img.url.clone().unwrap_or_default(),
        };
        pb.println(format!(
            "  #{} {} [{:?}] {}",
            img.id,
            img.label.as_deref().unwrap_or(""),
            img.kind,
            detail
        ));
        pb.inc(1);
    };

    let run = if regenerate {
        wizard.regenerate(on_ready).await?
    } else {
        wizard.generate_styles(on_ready).await?
    };
    pb.finish();
    Ok(run)
}
