//! Templated, localized message rendering.
//!
//! Pure lookup-and-substitute: no I/O, never fails. Lookup walks
//! kind -> message pack -> language, falling back pack-first
//! (`standard`) then language-first (`en`, then the first available).
//! `{{name}}` tokens are replaced from the variable bag; unknown tokens
//! are left verbatim.

use std::collections::{BTreeMap, HashMap};

use crate::domain::models::nudge::kind;
use crate::domain::models::Preferences;

type LangTable = BTreeMap<&'static str, &'static str>;
type PackTable = HashMap<&'static str, LangTable>;

/// Template catalog keyed by nudge kind.
pub struct MessageCatalog {
    templates: HashMap<&'static str, PackTable>,
}

impl MessageCatalog {
    /// The built-in catalog covering every shipped nudge kind.
    pub fn builtin() -> Self {
        let mut templates: HashMap<&'static str, PackTable> = HashMap::new();

        templates.insert(
            kind::BIRTHDAY_PRE,
            packs(&[
                ("standard", &[
                    ("en", "{{name}}'s birthday is coming up on {{date}} — maybe plan a little surprise?"),
                    ("ar", "عيد ميلاد {{name}} قادم في {{date}} — ربما تخططون لمفاجأة صغيرة؟"),
                ]),
                ("arabic_values", &[
                    ("en", "{{name}}'s birthday is on {{date}}. Gathering the family would make it special."),
                    ("ar", "عيد ميلاد {{name}} في {{date}}. اجتماع العائلة يجعله مميزًا."),
                ]),
            ]),
        );

        templates.insert(
            kind::GRATITUDE_POST,
            packs(&[
                ("standard", &[
                    ("en", "{{from}} just appreciated you! Take a moment to enjoy it."),
                    ("ar", "{{from}} عبّر عن تقديره لك! خذ لحظة لتستمتع بها."),
                ]),
                ("arabic_values", &[
                    ("en", "{{from}} thanked you — gratitude strengthens the family bond."),
                    ("ar", "{{from}} شكرك — الامتنان يقوي روابط العائلة."),
                ]),
            ]),
        );

        templates.insert(
            kind::GOAL_MILESTONE,
            packs(&[
                ("standard", &[
                    ("en", "Nice work! \"{{goal}}\" is {{percent}}% done. Keep it going!"),
                    ("ar", "عمل رائع! \"{{goal}}\" وصل إلى {{percent}}٪. واصل التقدم!"),
                ]),
                ("arabic_values", &[
                    ("en", "\"{{goal}}\" reached {{percent}}% — steady effort bears fruit."),
                    ("ar", "\"{{goal}}\" وصل إلى {{percent}}٪ — الاجتهاد يثمر."),
                ]),
            ]),
        );

        templates.insert(
            kind::EVENT_UPCOMING,
            packs(&[
                ("standard", &[
                    ("en", "Reminder: \"{{title}}\" is on the family calendar for {{when}}."),
                    ("ar", "تذكير: \"{{title}}\" على تقويم العائلة في {{when}}."),
                ]),
                ("arabic_values", &[
                    ("en", "\"{{title}}\" is coming up on {{when}} — a good time to be together."),
                    ("ar", "\"{{title}}\" قادم في {{when}} — وقت جميل للاجتماع."),
                ]),
            ]),
        );

        templates.insert(
            kind::NOTE_REPLY,
            packs(&[
                ("standard", &[
                    ("en", "There's a new note on the family board: {{preview}}"),
                    ("ar", "هناك ملاحظة جديدة على لوحة العائلة: {{preview}}"),
                ]),
            ]),
        );

        templates.insert(
            kind::WEEKLY_CHECKIN,
            packs(&[
                ("standard", &[
                    ("en", "How was everyone's week? A quick check-in goes a long way."),
                    ("ar", "كيف كان أسبوع الجميع؟ سؤال سريع يصنع فرقًا كبيرًا."),
                ]),
                ("arabic_values", &[
                    ("en", "A new week — a good moment to ask after everyone at home."),
                    ("ar", "أسبوع جديد — لحظة مناسبة للاطمئنان على أهل البيت."),
                ]),
            ]),
        );

        Self { templates }
    }

    /// Render a message for a kind under the user's pack and language.
    pub fn render(
        &self,
        nudge_kind: &str,
        prefs: &Preferences,
        variables: &BTreeMap<String, String>,
    ) -> String {
        let Some(pack_table) = self.templates.get(nudge_kind) else {
            // Unknown kind: generic fallback naming the bot, never an error.
            return format!("{} has a little reminder for you.", prefs.bot_name);
        };

        let pack = pack_table
            .get(prefs.message_pack.as_str())
            .or_else(|| pack_table.get("standard"))
            .or_else(|| pack_table.values().next());

        let Some(lang_table) = pack else {
            return format!("{} has a little reminder for you.", prefs.bot_name);
        };

        let template = lang_table
            .get(prefs.language.as_str())
            .or_else(|| lang_table.get("en"))
            .or_else(|| lang_table.values().next())
            .copied()
            .unwrap_or_default();

        substitute(template, variables)
    }

    /// Kinds present in the catalog.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.templates.keys().copied().collect()
    }
}

fn packs(entries: &[(&'static str, &[(&'static str, &'static str)])]) -> PackTable {
    entries
        .iter()
        .map(|(pack, langs)| (*pack, langs.iter().copied().collect()))
        .collect()
}

/// Replace every `{{name}}` token with its value; unknown tokens stay.
fn substitute(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in variables {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Language, MessagePack};
    use uuid::Uuid;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn prefs(pack: MessagePack, language: Language) -> Preferences {
        let mut p = Preferences::default_for(Uuid::new_v4());
        p.message_pack = pack;
        p.language = language;
        p
    }

    #[test]
    fn test_substitution() {
        let catalog = MessageCatalog::builtin();
        let msg = catalog.render(
            kind::GOAL_MILESTONE,
            &prefs(MessagePack::Standard, Language::En),
            &vars(&[("goal", "Read 12 books"), ("percent", "50")]),
        );
        assert_eq!(msg, "Nice work! \"Read 12 books\" is 50% done. Keep it going!");
    }

    #[test]
    fn test_unknown_tokens_left_verbatim() {
        let catalog = MessageCatalog::builtin();
        let msg = catalog.render(
            kind::GOAL_MILESTONE,
            &prefs(MessagePack::Standard, Language::En),
            &vars(&[("goal", "Walk daily")]),
        );
        assert!(msg.contains("{{percent}}"));
    }

    #[test]
    fn test_pack_match_language_fallback() {
        // A pack hit whose language is missing falls back to that pack's en,
        // not to the standard pack.
        let catalog = MessageCatalog::builtin();
        let p = prefs(MessagePack::ArabicValues, Language::Mix);
        let msg = catalog.render(kind::GRATITUDE_POST, &p, &vars(&[("from", "Sara")]));
        assert_eq!(msg, "Sara thanked you — gratitude strengthens the family bond.");
    }

    #[test]
    fn test_pack_fallback_to_standard() {
        // note_reply only ships a standard pack.
        let catalog = MessageCatalog::builtin();
        let p = prefs(MessagePack::ArabicValues, Language::Ar);
        let msg = catalog.render(kind::NOTE_REPLY, &p, &vars(&[("preview", "قائمة التسوق")]));
        assert_eq!(msg, "هناك ملاحظة جديدة على لوحة العائلة: قائمة التسوق");
    }

    #[test]
    fn test_unknown_kind_generic_fallback() {
        let catalog = MessageCatalog::builtin();
        let mut p = prefs(MessagePack::Standard, Language::En);
        p.bot_name = "Noor".to_string();
        let msg = catalog.render("no_such_kind", &p, &BTreeMap::new());
        assert_eq!(msg, "Noor has a little reminder for you.");
    }

    #[test]
    fn test_arabic_language_selected() {
        let catalog = MessageCatalog::builtin();
        let p = prefs(MessagePack::Standard, Language::Ar);
        let msg = catalog.render(kind::WEEKLY_CHECKIN, &p, &BTreeMap::new());
        assert!(msg.contains("أسبوع"));
    }
}
