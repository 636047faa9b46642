//! Event name and tag preparation: macro expansion and normalisation.

use vigil_common::config::{HostInfo, ItemInfo};
use vigil_common::types::{Tag, TriggerSnapshot, TAG_NAME_LEN, TAG_VALUE_LEN};

/// Objects macros are resolved against.
pub struct MacroContext<'a> {
    pub trigger: &'a TriggerSnapshot,
    /// First host referenced by the trigger expression, or the item's host.
    pub host: Option<&'a HostInfo>,
    /// Set only while expanding item tags.
    pub item: Option<&'a ItemInfo>,
}

impl MacroContext<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        match name {
            "TRIGGER.ID" => Some(self.trigger.triggerid.to_string()),
            "TRIGGER.NAME" => Some(self.trigger.description.clone()),
            "TRIGGER.NSEVERITY" => Some(self.trigger.priority.as_i32().to_string()),
            "TRIGGER.SEVERITY" => Some(self.trigger.priority.to_string()),
            "HOST.HOST" => self.host.map(|h| h.host.clone()),
            "HOST.NAME" => self.host.map(|h| h.name.clone()),
            "ITEM.ID" => self.item.map(|i| i.itemid.to_string()),
            "ITEM.KEY" => self.item.map(|i| i.key.clone()),
            _ => None,
        }
    }
}

/// Replaces `{MACRO}` tokens known to the context. Anything else is kept
/// as written.
pub fn expand_macros(text: &str, ctx: &MacroContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let resolved = tail
            .find('}')
            .and_then(|end| ctx.resolve(&tail[1..end]).map(|value| (end, value)));
        match resolved {
            Some((end, value)) => {
                out.push_str(&value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn clip(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim_start();
    let clipped = match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    };
    clipped.trim_end().to_string()
}

/// Left-trims, caps the length and right-trims name and value.
pub fn normalize_tag(tag: &Tag) -> Tag {
    Tag {
        tag: clip(&tag.tag, TAG_NAME_LEN),
        value: clip(&tag.value, TAG_VALUE_LEN),
    }
}

/// Normalises `tag` and appends it unless the name is empty or the exact
/// pair is already present.
pub fn add_tag(tags: &mut Vec<Tag>, tag: &Tag) -> bool {
    let tag = normalize_tag(tag);
    if tag.tag.is_empty() || tags.contains(&tag) {
        return false;
    }
    tags.push(tag);
    true
}
