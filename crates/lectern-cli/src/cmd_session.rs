use crate::context::{self, Sources};
use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use lectern_session::{
    DocumentRegistry, MemoryAddress, Session, SessionConfig, TabSet, codec,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Address used when encoding without `--url`.
const DEFAULT_BASE: &str = "http://localhost/";

#[derive(Subcommand, Debug)]
pub enum SessionOp {
    /// Restore the session in a link (or a bare token) and list its tabs
    Decode {
        /// Link carrying a `state` parameter, or the token itself
        input: String,
    },
    /// Build a link for a set of tabs
    Encode {
        /// Tab as doc:section:chapter[:scroll]; section is an id, name or index
        #[arg(long = "tab", required = true)]
        tabs: Vec<TabSpec>,

        /// Index of the selected tab
        #[arg(long)]
        active: Option<usize>,

        /// Address to install the session into
        #[arg(long, default_value = DEFAULT_BASE)]
        url: Url,
    },
    /// Open a tab in the session carried by a link
    Open {
        url: Url,
        document: String,
        section: String,
        chapter: u32,

        /// Leave the current selection alone
        #[arg(long)]
        no_focus: bool,
    },
    /// Close the tab at an index
    Close { url: Url, index: usize },
    /// Record a scroll offset for the tab at an index
    Scroll { url: Url, index: usize, offset: u64 },
}

/// A tab given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSpec {
    pub document: String,
    pub section: String,
    pub chapter: u32,
    pub scroll: u64,
}

impl FromStr for TabSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (document, section, chapter, scroll) = match parts.as_slice() {
            [d, s, c] => (*d, *s, *c, None),
            [d, s, c, o] => (*d, *s, *c, Some(*o)),
            _ => return Err(format!("expected doc:section:chapter[:scroll], got {:?}", s)),
        };
        if document.is_empty() || section.is_empty() {
            return Err(format!("empty document or section in {:?}", s));
        }
        let chapter = chapter
            .parse()
            .map_err(|_| format!("invalid chapter {:?}", chapter))?;
        let scroll = match scroll {
            Some(o) => o.parse().map_err(|_| format!("invalid scroll offset {:?}", o))?,
            None => 0,
        };
        Ok(Self {
            document: document.to_string(),
            section: section.to_string(),
            chapter,
            scroll,
        })
    }
}

#[derive(Debug, Serialize)]
struct TabView {
    index: usize,
    active: bool,
    document: String,
    section: usize,
    chapter: u32,
    scroll: u64,
    label: String,
}

fn describe(tabs: &TabSet) -> Vec<TabView> {
    let active = tabs.active();
    tabs.iter()
        .enumerate()
        .map(|(index, tab)| TabView {
            index,
            active: active == Some(index),
            document: tab.document_id().to_string(),
            section: tab.section_index(),
            chapter: tab.subsection_number(),
            scroll: tab.scroll_offset(),
            label: tab.label(),
        })
        .collect()
}

pub async fn run(sources: &Sources, op: SessionOp, pretty: bool) -> Result<()> {
    let registry = sources.registry()?;
    match op {
        SessionOp::Decode { input } => {
            let tabs = decode(&registry, &input).await?;
            let views = describe(&tabs);
            let json = if pretty {
                serde_json::to_string_pretty(&views)?
            } else {
                serde_json::to_string(&views)?
            };
            println!("{}", json);
        }
        op => {
            let url = apply(registry, op).await?;
            println!("{}", url);
        }
    }
    Ok(())
}

/// Restore a session from a link or token. Anything undecodable is an empty
/// session, as it would be in the reader.
async fn decode(registry: &Arc<DocumentRegistry>, input: &str) -> Result<TabSet> {
    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(_) => {
            let mut url = Url::parse(DEFAULT_BASE)?;
            codec::install(&mut url, codec::DEFAULT_PARAM, Some(input));
            url
        }
    };
    let session = restored(registry.clone(), url).await?;
    Ok(session.tabs().clone())
}

async fn restored(registry: Arc<DocumentRegistry>, url: Url) -> Result<Session<MemoryAddress>> {
    let config = SessionConfig::default().with_scroll_interval(Duration::ZERO);
    let mut session = Session::new(registry, MemoryAddress::new(url), config);
    session.restore().await?;
    Ok(session)
}

/// Apply one mutation to the session in a link and return the new link.
async fn apply(registry: Arc<DocumentRegistry>, op: SessionOp) -> Result<Url> {
    let session = match op {
        SessionOp::Decode { .. } => bail!("decode does not modify a session"),
        SessionOp::Encode { tabs, active, url } => {
            let mut session = restored(registry, url).await?;
            for spec in &tabs {
                let doc = context::load(session.registry(), &spec.document).await?;
                let section = context::section_index(&doc, &spec.section)?;
                let id = session
                    .add_tab(doc, section, spec.chapter, false)
                    .with_context(|| format!("Cannot open {}:{}:{}", spec.document, spec.section, spec.chapter))?;
                session.set_scroll(id, spec.scroll)?;
            }
            if let Some(index) = active {
                session.select(index)?;
            }
            session
        }
        SessionOp::Open {
            url,
            document,
            section,
            chapter,
            no_focus,
        } => {
            let mut session = restored(registry, url).await?;
            let doc = context::load(session.registry(), &document).await?;
            let section = context::section_index(&doc, &section)?;
            session.add_tab(doc, section, chapter, !no_focus)?;
            session
        }
        SessionOp::Close { url, index } => {
            let mut session = restored(registry, url).await?;
            let id = tab_at(session.tabs(), index)?;
            session.remove_tab(id)?;
            session
        }
        SessionOp::Scroll { url, index, offset } => {
            let mut session = restored(registry, url).await?;
            let id = tab_at(session.tabs(), index)?;
            session.set_scroll(id, offset)?;
            session.flush()?;
            session
        }
    };
    Ok(session.into_address().url().clone())
}

fn tab_at(tabs: &TabSet, index: usize) -> Result<lectern_session::TabId> {
    tabs.at(index)
        .map(|t| t.id())
        .ok_or_else(|| anyhow!("no tab at index {} ({} open)", index, tabs.len()))
}
