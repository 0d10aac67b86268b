use crate::context::{self, Sources};
use anyhow::Result;
use lectern::v1::{Document, Section, Subsection, Unit, query};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
struct Hit {
    label: String,
    unit: u32,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct SectionMatch {
    index: usize,
    id: String,
    name: String,
}

pub struct SearchArgs {
    pub document: String,
    pub query: String,
    pub section: Option<String>,
    pub sections: bool,
    pub link: Option<String>,
    pub json: bool,
}

pub async fn run(sources: &Sources, args: SearchArgs, pretty: bool) -> Result<()> {
    let registry = sources.registry()?;
    let doc = context::load(&registry, &args.document).await?;

    if args.sections {
        let matches = find_sections(&doc, &args.query);
        if args.json {
            print_json(&matches, pretty)?;
        } else {
            for m in &matches {
                println!("{:>3}  {}", m.index, m.name);
            }
        }
        return Ok(());
    }

    let hits = find_units(&doc, &args.query, args.section.as_deref(), args.link.as_deref())?;
    if args.json {
        print_json(&hits, pretty)?;
    } else {
        for hit in &hits {
            println!("{}:{}  {}", hit.label, hit.unit, hit.text);
            if let Some(link) = &hit.link {
                println!("    {}", link);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn find_sections(doc: &Document, q: &str) -> Vec<SectionMatch> {
    query::filter_sections(doc, q)
        .into_iter()
        .map(|(index, s)| SectionMatch {
            index,
            id: s.id.clone(),
            name: s.name.clone(),
        })
        .collect()
}

/// Unit text search over the whole document, or one section when given.
fn find_units(doc: &Document, q: &str, section: Option<&str>, link: Option<&str>) -> Result<Vec<Hit>> {
    let hit = |s: &Section, sub: &Subsection, unit: &Unit| Hit {
        label: query::tab_label(&doc.id, s, sub.number),
        unit: unit.number,
        text: unit.text.clone(),
        link: link.map(|base| query::permalink(base, s, sub.number, unit.number)),
    };

    match section {
        Some(key) => {
            let s = &doc.sections[context::section_index(doc, key)?];
            if query::normalize_query(q).is_empty() {
                return Ok(Vec::new());
            }
            Ok(s.subsections
                .iter()
                .flat_map(|sub| {
                    query::filter_units(sub, q)
                        .into_iter()
                        .map(move |unit| (sub, unit))
                })
                .map(|(sub, unit)| hit(s, sub, unit))
                .collect())
        }
        None => Ok(query::search_document(doc, q)
            .into_iter()
            .map(|h| hit(h.section, h.subsection, h.unit))
            .collect()),
    }
}
