//! Client lifecycle replay against an in-memory document.

use std::collections::HashMap;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tracing::debug;
use turbo_head::{
    desired_elements, AttrTarget, ClientHeadContext, ContributionHandle, HeadConfig, HeadContext,
    HeadDescriptor, HeadDocument, HeadPatch, MemoryDocument, Owner,
};

use super::ReplayArgs;
use crate::context::Context;
use crate::fixture::{Script, Step};
use crate::output::element_markup;

#[derive(Serialize)]
struct StepReport {
    step: usize,
    op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<HeadPatch>,
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    steps: Vec<StepReport>,
    document: &'a MemoryDocument,
}

/// Run the replay command.
pub fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let script = Script::load(&args.script)?;
    let config = script.config.clone().unwrap_or_else(|| ctx.config.clone());
    let mut session = Session::new(&script, config)?;

    let total = script.steps.len();
    ctx.output
        .header(&format!("Replaying {} ({} steps)", args.script, total));
    if total == 0 {
        ctx.output.info("Script has no steps.");
    }

    let mut reports = Vec::with_capacity(total);
    for (index, step) in script.steps.iter().enumerate() {
        let op = step.describe();
        ctx.output.step(index + 1, total, &op);

        let patch = session
            .apply(step)
            .with_context(|| format!("Step {} ({}) failed", index + 1, op))?;
        if let Some(patch) = &patch {
            let title = session.head.document().title();
            ctx.output.patch(patch, title.as_deref());
        }
        reports.push(StepReport {
            step: index + 1,
            op,
            patch,
        });
    }

    let document = session.document();
    if ctx.output.is_json() {
        ctx.output.json(&ReplayReport {
            steps: reports,
            document: &document,
        });
        return Ok(());
    }

    if args.show_document {
        ctx.output.header("Final document");
        ctx.output
            .kv("title", document.title().as_deref().unwrap_or("(none)"));
        for element in document.elements() {
            ctx.output.kv("element", &element_markup(&element));
        }
    }
    ctx.output.success(&format!(
        "Replayed {} step(s), {} document mutation(s)",
        total,
        document.mutations()
    ));

    Ok(())
}

/// Live client context driven by script steps.
pub struct Session {
    head: ClientHeadContext<MemoryDocument>,
    handles: HashMap<String, ContributionHandle>,
    owners: HashMap<String, Owner>,
}

impl Session {
    /// Build the client context, hydrating the document if requested.
    pub fn new(script: &Script, config: HeadConfig) -> Result<Self> {
        let document = match &script.hydrate {
            Some(descriptors) => hydrate(descriptors, config.clone())?,
            None => MemoryDocument::new(),
        };
        let head = HeadContext::client(config, document).context("Invalid head configuration")?;

        Ok(Self {
            head,
            handles: HashMap::new(),
            owners: HashMap::new(),
        })
    }

    /// Execute one step. Returns the patch if the document was touched.
    pub fn apply(&mut self, step: &Step) -> Result<Option<HeadPatch>> {
        let before = self.head.binder().consumer().applications();
        debug!(step = %step.describe(), "replaying step");

        match step {
            Step::Register { id, owner, head } => {
                if self.handles.contains_key(id) {
                    bail!("Contribution '{}' is already registered", id);
                }
                let owner = owner.as_ref().map(|name| {
                    self.owners
                        .entry(name.clone())
                        .or_insert_with(|| Owner::new(name.clone()))
                        .clone()
                });
                let handle = self.head.use_head(owner.as_ref(), head.clone())?;
                self.handles.insert(id.clone(), handle);
            }
            Step::Update { id, head } => {
                self.handle(id)?.update(head.clone())?;
            }
            Step::Withdraw { id } => {
                self.handle(id)?.withdraw();
            }
            Step::Teardown { owner } => match self.owners.get(owner) {
                Some(owner) => owner.teardown(),
                None => bail!("Unknown owner '{}'", owner),
            },
            Step::Mount => {
                self.head.mount();
            }
            Step::Flush => {
                self.head.flush();
            }
            Step::Pass => self.head.begin_pass(),
        }

        let after = self.head.binder().consumer().applications();
        Ok(if after > before {
            self.head.last_patch()
        } else {
            None
        })
    }

    pub fn document(&self) -> MemoryDocument {
        self.head.document().clone()
    }

    fn handle(&self, id: &str) -> Result<&ContributionHandle> {
        match self.handles.get(id) {
            Some(handle) => Ok(handle),
            None => bail!("Unknown contribution '{}'", id),
        }
    }
}

/// Document as the server would have rendered it for `descriptors`.
fn hydrate(descriptors: &[HeadDescriptor], config: HeadConfig) -> Result<MemoryDocument> {
    let server = HeadContext::server(config)?;
    for descriptor in descriptors {
        server.use_head(None, descriptor.clone())?;
    }
    let resolved = server.resolved();

    let mut document = MemoryDocument::hydrated(resolved.title.as_deref(), desired_elements(&resolved));
    document.set_attrs(AttrTarget::Html, &resolved.html_attrs);
    document.set_attrs(AttrTarget::Body, &resolved.body_attrs);
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbo_head::{SyncPolicy, TagEntry};

    fn register(id: &str, owner: Option<&str>, head: HeadDescriptor) -> Step {
        Step::Register {
            id: id.to_string(),
            owner: owner.map(str::to_string),
            head,
        }
    }

    #[test]
    fn test_session_register_mount_teardown() {
        let mut session = Session::new(&Script::default(), HeadConfig::new()).unwrap();

        let patch = session
            .apply(&register("a", Some("page"), HeadDescriptor::new().with_title("Home")))
            .unwrap();
        assert!(patch.is_none());

        let patch = session.apply(&Step::Mount).unwrap().unwrap();
        assert!(patch.title_changed);

        let patch = session
            .apply(&Step::Teardown {
                owner: "page".to_string(),
            })
            .unwrap()
            .unwrap();
        assert!(patch.title_changed);
        assert!(session.document().title().is_none());
    }

    #[test]
    fn test_session_batched_flush() {
        let config = HeadConfig::new().with_sync(SyncPolicy::Batched);
        let mut session = Session::new(&Script::default(), config).unwrap();
        session.apply(&Step::Mount).unwrap();

        let patch = session
            .apply(&register(
                "a",
                None,
                HeadDescriptor::new().with_meta(TagEntry::named("description", "x")),
            ))
            .unwrap();
        assert!(patch.is_none());

        let patch = session.apply(&Step::Flush).unwrap().unwrap();
        assert_eq!(patch.added.len(), 1);
    }

    #[test]
    fn test_session_hydration_has_nothing_to_add() {
        let head = HeadDescriptor::new()
            .with_title("Home")
            .with_html_attr("lang", "en");
        let script = Script {
            hydrate: Some(vec![head.clone()]),
            ..Script::default()
        };
        let mut session = Session::new(&script, HeadConfig::new()).unwrap();
        session.apply(&register("a", None, head)).unwrap();

        let patch = session.apply(&Step::Mount).unwrap().unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_session_unknown_ids() {
        let mut session = Session::new(&Script::default(), HeadConfig::new()).unwrap();
        assert!(session
            .apply(&Step::Withdraw {
                id: "missing".to_string()
            })
            .is_err());
        assert!(session
            .apply(&Step::Teardown {
                owner: "nobody".to_string()
            })
            .is_err());

        session
            .apply(&register("a", None, HeadDescriptor::new()))
            .unwrap();
        assert!(session
            .apply(&register("a", None, HeadDescriptor::new()))
            .is_err());
    }
}
