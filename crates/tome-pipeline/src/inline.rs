//! Inline tag rewriting.
//!
//! Rewrites the store's inline tag dialect (`@Localize`, `[[/r ...]]` roll
//! displays, `@Check`, `@Damage`, `@Template`, generic `@Name[...]{label}`
//! tags) into plain text. Document-link tags (`@UUID`, `@Compendium`, the
//! document kinds) and `@Embed` are deliberately left untouched here; the
//! link resolver owns them because they need document-graph access.
//!
//! The passes run in a fixed order and each sees the previous pass's
//! output. Several patterns overlap (a labelled damage tag matches both
//! the generic-label pass and the damage passes); the ordering below is
//! what disambiguates them, so it must not be rearranged:
//!
//! 1. localization (localized text may itself contain tags)
//! 2. labelled roll displays (label wins over the formula)
//! 3. bare roll displays (formula evaluated)
//! 4. checks carrying a DC and a label
//! 5. `@Embed` passthrough (no-op here)
//! 6. any other labelled non-link tag collapses to its label
//! 7. damage with type annotations
//! 8. bare damage
//! 9. area templates
//! 10. checks with a DC
//! 11. remaining checks (basic-save variant)
//!
//! Unmatched or malformed tags stay in the text as-is.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tome_graph::{DocumentKind, DocumentNode, Localizer};

use crate::PipelineContext;
use crate::formula;

static LOCALIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@Localize\[([^#\]]+)(?:#[^\]]+)?\](?:\{[^}]*\})?").unwrap()
});

static ROLL_LABELLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[/[br]+\s+.*?\]\]\{(.*?)\}").unwrap());

static ROLL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[/[br]+\s+([^\[\]]+)(?:\]|\[\s*([^\[\]]*)\])*\]\]").unwrap()
});

static CHECK_LABELLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Check\[[^\]]*?dc:(\d+)[^\]]*\]\{([^}]+)\}").unwrap());

static GENERIC_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(\w+)\[((?:[^\[\]]|\[[^\[\]]*\])*)\]\{([^}]*)\}").unwrap()
});

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@Template\[(?:type:)?([^|\]]+)\|distance:(\d+)[^\]]*\]").unwrap()
});

static CHECK_DC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@Check\[(?:type:)*([^|\]]+)\|[^\]]*?dc:(\d+)[^\]]*\]").unwrap()
});

static CHECK_BASIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Check\[(?:type:)*([^|\]]+)([^\]]*)\]").unwrap());

static PF2E_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\S*?\.pf2e\.\S+").unwrap());

/// Rewrite every recognized inline tag in `text`.
///
/// Synchronous and pure aside from localization lookups through the
/// context. Formulas are evaluated against `doc` (item level).
#[must_use]
pub fn rewrite(ctx: &PipelineContext<'_>, doc: &DocumentNode, text: &str) -> String {
    let text = localize_pass(ctx.localizer, text);
    let text = roll_labelled_pass(&text);
    let text = roll_pass(doc, &text);
    let text = check_labelled_pass(&text);
    let text = generic_labelled_pass(&text);
    let text = damage_pass(doc, &text);
    let text = template_pass(&text);
    let text = check_dc_pass(&text);
    check_basic_pass(&text)
}

/// `@Localize[key]` → looked-up string; unknown keys collapse to the key
/// itself, matching the host's localization behavior.
fn localize_pass(localizer: &dyn Localizer, text: &str) -> String {
    LOCALIZE
        .replace_all(text, |caps: &Captures<'_>| {
            let key = &caps[1];
            localizer.localize(key).unwrap_or_else(|| key.to_owned())
        })
        .into_owned()
}

/// `[[/r ...]]{label}` → the label, verbatim.
fn roll_labelled_pass(text: &str) -> String {
    ROLL_LABELLED.replace_all(text, "$1").into_owned()
}

/// `[[/r formula[annotation]]]` → evaluated formula, with the annotation
/// appended unless it is `healing` or a `#comment`.
fn roll_pass(doc: &DocumentNode, text: &str) -> String {
    ROLL.replace_all(text, |caps: &Captures<'_>| {
        let result = formula::evaluate(doc, &caps[1]);
        match caps.get(2).map(|m| m.as_str()) {
            Some(annotation)
                if !annotation.is_empty() && annotation != "healing" && !annotation.contains('#') =>
            {
                format!("{result} {}", annotation.replace(',', " "))
            }
            _ => result,
        }
    })
    .into_owned()
}

/// `@Check[...dc:N...]{label}` → `DC N label`.
fn check_labelled_pass(text: &str) -> String {
    CHECK_LABELLED.replace_all(text, "DC $1 $2").into_owned()
}

/// Any remaining `@Name[...]{label}` collapses to its label, unless `Name`
/// is a link-producing tag (resolved later against the document graph).
fn generic_labelled_pass(text: &str) -> String {
    GENERIC_LABELLED
        .replace_all(text, |caps: &Captures<'_>| {
            if is_link_tag(&caps[1]) {
                caps[0].to_owned()
            } else {
                caps[3].to_owned()
            }
        })
        .into_owned()
}

/// Whether a tag name produces a document link (or embed) and must survive
/// until link resolution.
pub(crate) fn is_link_tag(name: &str) -> bool {
    let name = name.strip_prefix("inline").unwrap_or(name);
    DocumentKind::from_link_tag(name).is_some()
        || matches!(name, "Compendium" | "UUID" | "Embed")
}

/// `@Damage[formula[type]|...]` and `@Damage[formula]` → evaluated amounts
/// with their type annotations.
///
/// Bracket groups nest one level (sub-term types), so this pass scans
/// balanced brackets instead of using a regex.
fn damage_pass(doc: &DocumentNode, text: &str) -> String {
    const TAG: &str = "@Damage";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(TAG) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + TAG.len()..];
        let (content, consumed) = parse_brackets(after);
        if consumed == 0 {
            out.push_str(TAG);
            rest = after;
            continue;
        }
        out.push_str(&render_damage(doc, &content));
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

/// Render the bracket content of one damage tag.
fn render_damage(doc: &DocumentNode, content: &str) -> String {
    if !content.contains('[') {
        // Bare form: a single formula, no type annotation.
        return strip_edge_parens(&formula::evaluate(doc, content));
    }

    let mut amounts = Vec::new();
    let mut kinds = Vec::new();
    for term in split_terms(content) {
        let term = term.trim().trim_matches([',', '|']);
        if term.is_empty() {
            continue;
        }
        if let Some((formula_text, kind)) = split_typed_term(term) {
            amounts.push(strip_edge_parens(&formula::evaluate(doc, formula_text)));
            let kind = clean_kind(&kind);
            if !kind.is_empty() {
                kinds.push(kind);
            }
        } else {
            amounts.push(strip_edge_parens(&formula::evaluate(doc, term)));
        }
    }

    let mut out = amounts.join(" + ");
    if !kinds.is_empty() {
        out.push(' ');
        out.push_str(&kinds.join(" "));
    }
    out
}

/// Split damage content at top-level `|` and `,` separators.
fn split_terms(content: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '|' | ',' if depth == 0 => {
                terms.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&content[start..]);
    terms
}

/// Split `formula[type]` into its parts; `None` when no type bracket.
fn split_typed_term(term: &str) -> Option<(&str, String)> {
    let pos = term.find('[')?;
    let (kind, consumed) = parse_brackets(&term[pos..]);
    if consumed == 0 {
        // Unclosed bracket from a sloppy split; treat everything before it
        // as the formula and the rest as the type.
        return Some((&term[..pos], term[pos + 1..].to_owned()));
    }
    Some((&term[..pos], kind))
}

/// Drop module-flag references from a damage type and de-comma it.
fn clean_kind(kind: &str) -> String {
    let kind = if kind.contains('@') {
        PF2E_FLAG.replace_all(kind, "").into_owned()
    } else {
        kind.to_owned()
    };
    kind.replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove one leading `(` and one trailing `)`, independently.
///
/// Splitting damage terms on separators leaves this kind of imbalance
/// behind; stripping each edge on its own mirrors how the terms were cut.
fn strip_edge_parens(text: &str) -> String {
    let text = text.strip_prefix('(').unwrap_or(text);
    let text = text.strip_suffix(')').unwrap_or(text);
    text.to_owned()
}

/// Parse a balanced `[...]` group at the start of `s`.
///
/// Returns (content, bytes consumed including brackets), or an empty
/// content with zero consumed when `s` doesn't open a bracket group or
/// the group never closes.
fn parse_brackets(s: &str) -> (String, usize) {
    if !s.starts_with('[') {
        return (String::new(), 0);
    }

    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return (s[1..i].to_owned(), i + 1);
                }
            }
            _ => {}
        }
    }
    (String::new(), 0)
}

/// `@Template[type:X|distance:N|...]` → `N-foot X`.
fn template_pass(text: &str) -> String {
    TEMPLATE.replace_all(text, "$2-foot $1").into_owned()
}

/// `@Check[type:X|...dc:N|...]` → `DC N X check`, with the type slug
/// title-cased.
fn check_dc_pass(text: &str) -> String {
    CHECK_DC
        .replace_all(text, |caps: &Captures<'_>| {
            format!("DC {} {} check", &caps[2], titlecase_slug(&caps[1]))
        })
        .into_owned()
}

/// Remaining `@Check[type:X|...]` tags → `basic X check` or `X check`.
fn check_basic_pass(text: &str) -> String {
    CHECK_BASIC
        .replace_all(text, |caps: &Captures<'_>| {
            let name = titlecase_slug(&caps[1]);
            if caps[2].contains("basic:true") {
                format!("basic {name} check")
            } else {
                format!("{name} check")
            }
        })
        .into_owned()
}

/// `astrology-lore` → `Astrology Lore`.
fn titlecase_slug(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tome_archive::ArchiveSink;
    use tome_config::{IconStyle, IdentifierNaming};
    use tome_graph::mock::MemoryGraph;

    fn doc(level: i64) -> DocumentNode {
        let mut node = DocumentNode::new("Item.test", "Test", DocumentKind::Item);
        node.level = Some(level);
        node
    }

    fn run(text: &str) -> String {
        run_with_localizer(text, &HashMap::<String, String>::new())
    }

    fn run_with_localizer(text: &str, localizer: &dyn Localizer) -> String {
        let graph = MemoryGraph::new();
        let sink = RefCell::new(ArchiveSink::new("zz_asset-files"));
        let ctx = PipelineContext::new(
            &graph,
            localizer,
            &sink,
            IdentifierNaming::Uuid,
            IconStyle::Shortcode,
        );
        rewrite(&ctx, &doc(3), text)
    }

    #[test]
    fn plain_text_passes_through_unchanged() {
        let text = "The goblin attacks with its dogslicer.";
        assert_eq!(run(text), text);
    }

    #[test]
    fn check_with_dc() {
        assert_eq!(
            run("@Check[type:athletics|dc:15|traits:action:climb]"),
            "DC 15 Athletics check"
        );
        assert_eq!(run("@Check[fortitude|dc:42]"), "DC 42 Fortitude check");
        assert_eq!(run("@Check[type:flat|dc:16]"), "DC 16 Flat check");
    }

    #[test]
    fn check_with_label() {
        assert_eq!(
            run("@Check[type:athletics|dc:20|traits:action:climb]{Climb the cliff}"),
            "DC 20 Climb the cliff"
        );
    }

    #[test]
    fn check_basic_save() {
        assert_eq!(
            run("@Check[type:reflex|dc:resolve(@actor.attributes.spellDC.value)|basic:true]"),
            "basic Reflex check"
        );
        assert_eq!(run("@Check[type:astrology-lore]"), "Astrology Lore check");
        assert_eq!(run("@Check[type:athletics|defense:reflex]"), "Athletics check");
    }

    #[test]
    fn template_typed_and_untyped() {
        assert_eq!(run("@Template[type:cone|distance:30]"), "30-foot cone");
        assert_eq!(
            run("@Template[type:cone|distance:40|traits:arcane,evocation]"),
            "40-foot cone"
        );
        assert_eq!(run("@Template[burst|distance:10]"), "10-foot burst");
    }

    #[test]
    fn roll_with_label_keeps_label() {
        assert_eq!(run("[[/r 2d8+4 #Piercing]]{2d8+4 piercing}"), "2d8+4 piercing");
        assert_eq!(run("[[/br 1d20]]{Secret roll}"), "Secret roll");
    }

    #[test]
    fn roll_bare_evaluates_and_strips_comment() {
        assert_eq!(run("[[/r 1d4 #minutes]]"), "1d4");
        assert_eq!(run("[[/r 2d6]]"), "2d6");
        assert_eq!(run("[[/r (@item.level)d6]]"), "3d6");
    }

    #[test]
    fn roll_annotation_is_appended_unless_healing() {
        assert_eq!(run("[[/r 2d8[slashing]]]"), "2d8 slashing");
        assert_eq!(run("[[/r 1d8[healing]]]"), "1d8");
    }

    #[test]
    fn damage_with_type() {
        assert_eq!(run("@Damage[(2d6+4)[bludgeoning]]"), "2d6+4 bludgeoning");
        assert_eq!(run("@Damage[(@item.level+1)d10[vitality]]"), "4d10 vitality");
    }

    #[test]
    fn damage_bare() {
        assert_eq!(run("@Damage[2d4]"), "2d4");
        assert_eq!(run("@Damage[(@item.level)d6]"), "3d6");
    }

    #[test]
    fn damage_multi_term_joins_with_plus() {
        assert_eq!(run("@Damage[1d6[fire]|1d4[cold]]"), "1d6 + 1d4 fire cold");
        assert_eq!(run("@Damage[2d6[slashing],1d4[fire]]"), "2d6 + 1d4 slashing fire");
    }

    #[test]
    fn damage_type_drops_flag_references() {
        assert_eq!(
            run("@Damage[1d6[@actor.flags.pf2e.weaponTrait fire]]"),
            "1d6 fire"
        );
    }

    #[test]
    fn labelled_damage_collapses_to_label() {
        assert_eq!(run("@Damage[(2d6+4)[bludgeoning]]{lots of damage}"), "lots of damage");
    }

    #[test]
    fn generic_labelled_tag_collapses_to_label() {
        assert_eq!(run("@SomeTag[a|b:c]{the label}"), "the label");
    }

    #[test]
    fn link_tags_are_left_for_the_resolver() {
        let uuid = "@UUID[Actor.abc]{The Goblin}";
        assert_eq!(run(uuid), uuid);
        let compendium = "@Compendium[pf2e.spells.xyz]{Fireball}";
        assert_eq!(run(compendium), compendium);
        let inline_actor = "@inlineActor[abc]{Token}";
        assert_eq!(run(inline_actor), inline_actor);
        let embed = "@Embed[Compendium.pf2e.bestiary.Actor.x inline]";
        assert_eq!(run(embed), embed);
    }

    #[test]
    fn localize_runs_first_so_inner_tags_rewrite() {
        let mut map = HashMap::new();
        map.insert(
            "PF2E.Rules.Note".to_owned(),
            "Attempt a @Check[type:will|dc:20].".to_owned(),
        );
        assert_eq!(
            run_with_localizer("@Localize[PF2E.Rules.Note]", &map),
            "Attempt a DC 20 Will check."
        );
    }

    #[test]
    fn unknown_localize_key_collapses_to_key() {
        assert_eq!(run("@Localize[PF2E.Missing.Key]"), "PF2E.Missing.Key");
    }

    #[test]
    fn malformed_tags_stay_literal() {
        assert_eq!(run("@Damage[1d6"), "@Damage[1d6");
        assert_eq!(run("@Check[type:will"), "@Check[type:will");
    }

    #[test]
    fn mixed_prose_rewrites_in_place() {
        assert_eq!(
            run("Make a @Check[type:acrobatics|dc:18] or take @Damage[(2d6)[fire]]."),
            "Make a DC 18 Acrobatics check or take 2d6 fire."
        );
    }
}
