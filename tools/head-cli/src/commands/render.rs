//! Server-side rendering of a head fixture.

use anyhow::{Context as _, Result};
use serde::Serialize;
use turbo_head::{HeadConfig, HeadContext, ResolvedHead, SerializedHead, ServerHeadContext};

use super::{RenderArgs, RenderFormat};
use crate::context::Context;
use crate::fixture::Fixture;

#[derive(Serialize)]
struct RenderReport<'a> {
    serialized: &'a SerializedHead,
    resolved: &'a ResolvedHead,
}

/// Run the render command.
pub fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let config = fixture.config.clone().unwrap_or_else(|| ctx.config.clone());
    ctx.output.debug(&format!(
        "Rendering {} contribution(s) from {}",
        fixture.contributions.len(),
        args.fixture
    ));

    let head = build(&fixture, config)?;

    match args.format {
        RenderFormat::Json => print_report(&head, ctx),
        _ if ctx.output.is_json() => print_report(&head, ctx),
        RenderFormat::Html => ctx.output.raw(&head.render_head().head_tags),
        RenderFormat::Document => {
            let body = fixture.body.as_deref().unwrap_or_default();
            ctx.output.raw(&head.render_document(body));
        }
    }

    Ok(())
}

/// Register every fixture contribution on a fresh server context.
pub fn build(fixture: &Fixture, config: HeadConfig) -> Result<ServerHeadContext> {
    let head = HeadContext::server(config).context("Invalid head configuration")?;
    for (index, descriptor) in fixture.contributions.iter().enumerate() {
        head.use_head(None, descriptor.clone())
            .with_context(|| format!("Contribution #{} rejected", index + 1))?;
    }
    Ok(head)
}

fn print_report(head: &ServerHeadContext, ctx: &Context) {
    let serialized = head.render_head();
    let resolved = head.resolved();
    ctx.output.json(&RenderReport {
        serialized: &serialized,
        resolved: &resolved,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbo_head::{HeadDescriptor, TagEntry};

    #[test]
    fn test_build_renders_fixture() {
        let fixture = Fixture {
            contributions: vec![
                HeadDescriptor::new()
                    .with_title("Home")
                    .with_meta(TagEntry::named("description", "x")),
                HeadDescriptor::new().with_charset("utf-8"),
            ],
            ..Fixture::default()
        };

        let head = build(&fixture, HeadConfig::new().with_title_template("%s - Site")).unwrap();
        assert_eq!(
            head.render_head().head_tags,
            "<meta charset=\"utf-8\">\n<title>Home - Site</title>\n<meta name=\"description\" content=\"x\">\n"
        );
    }

    #[test]
    fn test_build_reports_rejected_contribution() {
        let fixture = Fixture {
            contributions: vec![HeadDescriptor::new().with_meta(TagEntry::new())],
            ..Fixture::default()
        };
        let err = build(&fixture, HeadConfig::new()).err().expect("build should fail");
        assert!(format!("{:#}", err).contains("Contribution #1 rejected"));
    }
}
