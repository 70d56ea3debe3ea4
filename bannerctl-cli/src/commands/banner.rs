use std::collections::BTreeMap;

use anyhow::{Context, Result};
use bannerctl_core::{Banner, BannerId, SaveMode, SliderId, SliderSelection};
use clap::Parser;
use serde::Serialize;

use crate::config::BannerctlConfig;

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Banner name
    #[arg(long)]
    pub name: String,

    /// Link target; a missing scheme becomes https://
    #[arg(long)]
    pub url: Option<String>,

    /// Image path or URL
    #[arg(long)]
    pub image: Option<String>,

    /// Create the banner disabled
    #[arg(long)]
    pub disabled: bool,

    /// Slider ids to assign (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub sliders: Option<Vec<SliderId>>,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Banner id
    #[arg(long)]
    pub id: BannerId,

    /// New banner name
    #[arg(long)]
    pub name: Option<String>,

    /// New link target
    #[arg(long)]
    pub url: Option<String>,

    /// New image path or URL
    #[arg(long)]
    pub image: Option<String>,

    /// Enable or disable the banner
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Replace slider assignments with exactly these ids (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS", conflicts_with = "clear_sliders")]
    pub sliders: Option<Vec<SliderId>>,

    /// Remove every slider assignment
    #[arg(long)]
    pub clear_sliders: bool,
}

#[derive(Parser, Debug)]
pub struct IdArgs {
    /// Banner id
    #[arg(long)]
    pub id: BannerId,
}

/// Printed by `show`, `create` and `update`
#[derive(Serialize)]
struct BannerView<'a> {
    banner: &'a Banner,
    /// slider_id -> position
    sliders: BTreeMap<SliderId, i32>,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Map slider flags to a relation intent; neither flag means "leave alone".
fn selection(sliders: Option<Vec<SliderId>>, clear: bool) -> SliderSelection {
    match (sliders, clear) {
        (_, true) => SliderSelection::none(),
        (Some(ids), false) => SliderSelection::ids(ids),
        (None, false) => SliderSelection::Unspecified,
    }
}

pub async fn run_create(config: &BannerctlConfig, args: CreateArgs) -> Result<()> {
    let service = super::banner_service(super::connect(config).await?);

    let mut banner = Banner::new(args.name).with_sliders(selection(args.sliders, false));
    banner.url = args.url;
    banner.image = args.image;
    banner.enabled = !args.disabled;

    let outcome = service
        .save(&mut banner, SaveMode::Create)
        .await
        .context("Failed to create banner")?;
    let sliders = service.sliders_for_banner(outcome.banner_id).await?;
    print_json(&BannerView {
        banner: &banner,
        sliders,
    })
}

pub async fn run_update(config: &BannerctlConfig, args: UpdateArgs) -> Result<()> {
    let service = super::banner_service(super::connect(config).await?);

    let mut banner = service
        .load(args.id)
        .await
        .context(format!("Failed to load banner {}", args.id))?;
    if let Some(name) = args.name {
        banner.name = name;
    }
    if let Some(url) = args.url {
        banner.url = Some(url);
    }
    if let Some(image) = args.image {
        banner.image = Some(image);
    }
    if let Some(enabled) = args.enabled {
        banner.enabled = enabled;
    }
    banner.desired_sliders = selection(args.sliders, args.clear_sliders);

    service
        .save(&mut banner, SaveMode::Update)
        .await
        .context(format!("Failed to update banner {}", args.id))?;
    let sliders = service.sliders_for_banner(args.id).await?;
    print_json(&BannerView {
        banner: &banner,
        sliders,
    })
}

pub async fn run_show(config: &BannerctlConfig, args: IdArgs) -> Result<()> {
    let service = super::banner_service(super::connect(config).await?);

    let banner = service
        .load(args.id)
        .await
        .context(format!("Failed to load banner {}", args.id))?;
    let sliders = service.sliders_for_banner(args.id).await?;
    print_json(&BannerView {
        banner: &banner,
        sliders,
    })
}

pub async fn run_delete(config: &BannerctlConfig, args: IdArgs) -> Result<()> {
    let service = super::banner_service(super::connect(config).await?);

    let name = service.banner_name(args.id).await?;
    service
        .delete(args.id)
        .await
        .context(format!("Failed to delete banner {}", args.id))?;
    println!(
        "Deleted banner {} ({})",
        args.id,
        name.unwrap_or_else(|| "unnamed".to_string())
    );
    Ok(())
}
