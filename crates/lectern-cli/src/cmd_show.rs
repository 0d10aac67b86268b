use crate::context::{self, Sources};
use anyhow::{Result, bail};
use lectern::v1::{Document, query};
use std::fmt::Write;

pub async fn run(
    sources: &Sources,
    document: String,
    section: Option<String>,
    chapter: Option<u32>,
) -> Result<()> {
    let registry = sources.registry()?;
    let doc = context::load(&registry, &document).await?;
    print!("{}", render(&doc, section.as_deref(), chapter)?);
    Ok(())
}

fn render(doc: &Document, section: Option<&str>, chapter: Option<u32>) -> Result<String> {
    let mut out = String::new();
    match (section, chapter) {
        (None, None) => {
            let _ = writeln!(out, "{} ({})", doc.name, doc.id);
            for (i, s) in doc.sections.iter().enumerate() {
                let _ = writeln!(out, "{:>3}  {}  [{} chapters]", i, s.name, s.subsections.len());
            }
        }
        (None, Some(_)) => bail!("--chapter requires --section"),
        (Some(key), None) => {
            let index = context::section_index(doc, key)?;
            let s = &doc.sections[index];
            let _ = writeln!(out, "{} ({})", s.name, s.id);
            for sub in &s.subsections {
                let _ = writeln!(out, "{:>3}  {} verses", sub.number, sub.units.len());
            }
        }
        (Some(key), Some(number)) => {
            let index = context::section_index(doc, key)?;
            let Some((s, sub)) = doc.position(index, number) else {
                bail!("{} has no chapter {}", doc.sections[index].name, number);
            };
            let _ = writeln!(out, "{}", query::tab_label(&doc.id, s, sub.number));
            for unit in &sub.units {
                let _ = writeln!(out, "{} {}", unit.number, unit.text);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern::v1::{Section, Subsection};

    fn make_doc() -> Document {
        Document::new("kjv", "King James Version", "Christian Canon")
            .with_section(
                Section::new("genesis", "Genesis")
                    .with_subsection(
                        Subsection::new(1)
                            .with_unit(1, "In the beginning God created the heaven and the earth.")
                            .with_unit(2, "And the earth was without form, and void."),
                    )
                    .with_subsection(Subsection::new(2).with_unit(1, "Thus the heavens")),
            )
            .with_section(
                Section::new("exodus", "Exodus")
                    .with_subsection(Subsection::new(1).with_unit(1, "Now these are the names")),
            )
    }

    #[test]
    fn test_render_sections() {
        let out = render(&make_doc(), None, None).unwrap();
        assert_eq!(
            out,
            "King James Version (kjv)\n  0  Genesis  [2 chapters]\n  1  Exodus  [1 chapters]\n"
        );
    }

    #[test]
    fn test_render_chapters() {
        let out = render(&make_doc(), Some("genesis"), None).unwrap();
        assert_eq!(out, "Genesis (genesis)\n  1  2 verses\n  2  1 verses\n");
    }

    #[test]
    fn test_render_units() {
        let out = render(&make_doc(), Some("1"), Some(1)).unwrap();
        assert_eq!(out, "KJV Exodus 1\n1 Now these are the names\n");
    }

    #[test]
    fn test_render_errors() {
        let doc = make_doc();
        assert!(render(&doc, None, Some(1)).is_err());
        assert!(render(&doc, Some("leviticus"), None).is_err());
        assert!(render(&doc, Some("genesis"), Some(3)).is_err());
    }
}
