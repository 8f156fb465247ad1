//! Message bodies sent to the platform
//!
//! Everything here renders Telegram HTML. User-supplied text goes through
//! [`escape_html`]; empty or whitespace-only fields are left out entirely.

use refdir_common::db::{Category, PartnerProfile, Request, RequestKind};

/// Telegram's limit on photo captions, in characters
pub const CAPTION_LIMIT: usize = 1024;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn category_line(categories: &[Category]) -> String {
    let names: Vec<String> = categories
        .iter()
        .map(|c| escape_html(c.name.trim()))
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        "📂 <b>Categories:</b> Not specified".to_string()
    } else {
        format!("📂 <b>Categories:</b> {}", names.join(", "))
    }
}

/// Notification body posted under each matched partner's card
pub fn request_notification(request: &Request, categories: &[Category]) -> String {
    let mut sections: Vec<String> = Vec::new();

    match request.kind {
        RequestKind::Order => {
            sections.push("🛒 <b>New order!</b>".to_string());

            let mut head = vec![category_line(categories)];
            if let Some(title) = present(request.title.as_deref()) {
                head.push(format!("📝 <b>Title:</b> {}", escape_html(title)));
            }
            sections.push(head.join("\n"));

            if let Some(text) = present(Some(&request.text)) {
                sections.push(escape_html(text));
            }

            let extras: Vec<String> = [
                ("📍", "City", request.city.as_deref()),
                ("💰", "Budget", request.budget.as_deref()),
                ("📞", "Contact", request.contact.as_deref()),
            ]
            .into_iter()
            .filter_map(|(icon, label, value)| {
                present(value).map(|v| format!("{} <b>{}:</b> {}", icon, label, escape_html(v)))
            })
            .collect();
            if !extras.is_empty() {
                sections.push(extras.join("\n"));
            }
        }
        RequestKind::Question => {
            sections.push("❓ <b>New question!</b>".to_string());
            sections.push(category_line(categories));

            if let Some(text) = present(Some(&request.text)) {
                sections.push(escape_html(text));
            }
            if let Some(details) = present(request.details.as_deref()) {
                sections.push(format!("📋 <b>Details:</b>\n{}", escape_html(details)));
            }
        }
    }

    sections.join("\n\n")
}

/// One linkable partner in the requester summary
#[derive(Debug, Clone)]
pub struct SummaryLink {
    pub name: String,
    pub url: String,
}

pub const LINKS_LATER: &str = "Partner links will be available later.";

/// Requester summary listing every linkable notified partner
pub fn requester_summary(kind: RequestKind, notified_count: usize, links: &[SummaryLink]) -> String {
    let noun = match kind {
        RequestKind::Order => "order",
        RequestKind::Question => "question",
    };
    let plural = if notified_count == 1 { "" } else { "s" };

    let mut message = format!(
        "✅ Your {} was sent to {} partner{}.\n\n",
        noun, notified_count, plural
    );

    if links.is_empty() {
        message.push_str(LINKS_LATER);
    } else {
        let lines: Vec<String> = links
            .iter()
            .map(|link| {
                format!(
                    "• <a href=\"{}\">{}</a>",
                    escape_html(&link.url),
                    escape_html(&link.name)
                )
            })
            .collect();
        message.push_str(&lines.join("\n"));
    }

    message
}

fn telegram_link(handle: &str) -> String {
    match handle.strip_prefix('@') {
        Some(name) => format!("https://t.me/{}", name),
        None => handle.to_string(),
    }
}

fn website_link(site: &str) -> String {
    if site.starts_with("http://") || site.starts_with("https://") {
        site.to_string()
    } else {
        format!("https://{}", site)
    }
}

fn link(url: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(url), label)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Escape `text` into at most `budget` characters
///
/// An escaped character is kept or dropped whole, so entities are never
/// split. A shortened result ends with an ellipsis; None when nothing fits.
fn escape_within(text: &str, budget: usize) -> Option<String> {
    let escaped = escape_html(text);
    if char_len(&escaped) <= budget {
        return Some(escaped);
    }

    let mut cut = String::new();
    let mut used = 0;
    for c in text.chars() {
        let piece = escape_html(c.encode_utf8(&mut [0; 4]));
        let width = char_len(&piece);
        // one slot stays free for the ellipsis
        if used + width + 1 > budget {
            break;
        }
        cut.push_str(&piece);
        used += width;
    }

    let cut = cut.trim_end();
    if cut.is_empty() {
        return None;
    }
    Some(format!("{}…", cut))
}

/// Fit free text into the caption's spare room, after `overhead` characters
/// of separators and prefix
fn fit_free_text(text: Option<&str>, overhead: usize, spare: &mut usize) -> Option<String> {
    let text = present(text)?;
    let fitted = escape_within(text, spare.checked_sub(overhead)?)?;
    *spare -= overhead + char_len(&fitted);
    Some(fitted)
}

/// Longest prefix of whole lines within `limit` characters
///
/// Every caption line carries its own balanced markup, so a line cut never
/// leaves a tag open.
fn cut_at_line(text: &str, limit: usize) -> String {
    let mut kept = 0;
    let mut end = 0;
    for line in text.split_inclusive('\n') {
        let width = char_len(line);
        if kept + width > limit {
            break;
        }
        kept += width;
        end += line.len();
    }
    text[..end].trim_end().to_string()
}

const NAME_LIMIT: usize = 128;

/// Caption of the partner's card in the broadcast channel
///
/// Never longer than [`CAPTION_LIMIT`] characters. The agency and personal
/// descriptions are shortened first; tags always stay balanced.
pub fn partner_card_caption(partner: &PartnerProfile, categories: &[Category]) -> String {
    let name = escape_within(partner.name.trim(), NAME_LIMIT).unwrap_or_default();
    let mut head = vec![format!("👤 <b>{}</b>", name)];
    if let Some(profession) = present(partner.profession.as_deref()) {
        head.push(format!("💼 {}", escape_html(profession)));
    }
    if let Some(city) = present(partner.city.as_deref()) {
        head.push(format!("📍 {}", escape_html(city)));
    }
    let head = head.join("\n");

    let agency_name = present(partner.agency_name.as_deref())
        .map(|agency| format!("🏢 <b>{}</b>", escape_html(agency)));

    let names: Vec<String> = categories
        .iter()
        .map(|c| escape_html(c.name.trim()))
        .filter(|n| !n.is_empty())
        .collect();
    let tags = (!names.is_empty()).then(|| format!("🏷️ <i>{}</i>", names.join(", ")));

    let contacts = contact_lines(partner).join("\n");

    let fixed: Vec<&str> = [
        Some(head.as_str()),
        agency_name.as_deref(),
        tags.as_deref(),
        Some(contacts.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect();
    let mut spare = CAPTION_LIMIT.saturating_sub(char_len(&fixed.join("\n\n")));

    // Each description costs a section break, plus the 📝 marker for the second
    let agency_about = fit_free_text(partner.agency_description.as_deref(), 2, &mut spare);
    let self_about = fit_free_text(partner.self_description.as_deref(), 4, &mut spare);

    let mut sections = vec![head];
    match (agency_name, agency_about) {
        (Some(name), Some(about)) => sections.push(format!("{}\n{}", name, about)),
        (Some(name), None) => sections.push(name),
        (None, Some(about)) => sections.push(about),
        (None, None) => {}
    }
    if let Some(about) = self_about {
        sections.push(format!("📝 {}", about));
    }
    sections.extend(tags);
    sections.push(contacts);

    let caption = sections.join("\n\n");
    if char_len(&caption) <= CAPTION_LIMIT {
        caption
    } else {
        cut_at_line(&caption, CAPTION_LIMIT)
    }
}

fn contact_lines(partner: &PartnerProfile) -> Vec<String> {
    let mut lines = vec!["📞 <b>Contacts:</b>".to_string()];
    if let Some(phone) = present(partner.phone.as_deref()) {
        lines.push(format!("📱 {}", escape_html(phone)));
    }
    if let Some(handle) = present(partner.tg_channel.as_deref()) {
        lines.push(format!("💬 {}", link(&telegram_link(handle), "Telegram")));
    }
    if let Some(site) = present(partner.website.as_deref()) {
        lines.push(format!("🌐 {}", link(&website_link(site), "Website")));
    }

    let videos: Vec<String> = [
        (partner.youtube.as_deref(), "YouTube"),
        (partner.rutube.as_deref(), "Rutube"),
        (partner.dzen.as_deref(), "Dzen"),
        (partner.vk_video.as_deref(), "VK Video"),
    ]
    .into_iter()
    .filter_map(|(url, label)| present(url).map(|url| link(url, label)))
    .chain(present(partner.tg_video.as_deref()).map(|h| link(&telegram_link(h), "TG Video")))
    .collect();
    if !videos.is_empty() {
        lines.push(format!("▶️ {}", videos.join(" | ")));
    }

    if let Some(address) = present(partner.office_address.as_deref()) {
        lines.push(format!("🏠 {}", escape_html(address)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdir_common::db::{PartnerStatus, Tier};

    fn order() -> Request {
        Request {
            kind: RequestKind::Order,
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            category_id: "c1".to_string(),
            extra_category_ids: Vec::new(),
            title: Some("Kitchen <renovation>".to_string()),
            text: "Need it done by May & June".to_string(),
            city: Some("  ".to_string()),
            budget: Some("5000".to_string()),
            contact: None,
            details: None,
            status: None,
            created_at: None,
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: name.to_lowercase(),
            name: name.to_string(),
        }
    }

    fn partner() -> PartnerProfile {
        PartnerProfile {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            name: "Anna".to_string(),
            status: PartnerStatus::Active,
            tier: Tier::Free,
            discussion_message_id: None,
            channel_post_id: None,
            category_ids: Vec::new(),
            profession: Some("Architect".to_string()),
            city: None,
            phone: None,
            tg_channel: Some("@anna_arch".to_string()),
            website: Some("anna.example".to_string()),
            youtube: None,
            rutube: None,
            dzen: None,
            vk_video: None,
            tg_video: None,
            self_description: None,
            agency_name: None,
            agency_description: None,
            office_address: None,
            photo_url: None,
        }
    }

    /// Tags open and close in pairs and every `&` starts a whole entity
    fn assert_well_formed(caption: &str) {
        for (open, close) in [("<b>", "</b>"), ("<i>", "</i>"), ("<a ", "</a>")] {
            assert_eq!(
                caption.matches(open).count(),
                caption.matches(close).count(),
                "unbalanced {} in {:?}",
                open,
                caption
            );
        }
        for (at, _) in caption.match_indices('&') {
            let rest = &caption[at..];
            assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;"].iter().any(|e| rest.starts_with(e)),
                "split entity at {}",
                at
            );
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<b>"A&B"</b>"#), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_escape_within_keeps_entities_whole() {
        assert_eq!(escape_within("a&b", 10).as_deref(), Some("a&amp;b"));
        // "a&amp;" would need 7 with the ellipsis
        assert_eq!(escape_within("a&b", 6).as_deref(), Some("a…"));
        assert_eq!(escape_within("&&&", 3), None);
    }

    #[test]
    fn test_order_body_omits_empty_fields() {
        let body = request_notification(&order(), &[category("Repair"), category("Design")]);

        assert!(body.starts_with("🛒 <b>New order!</b>"));
        assert!(body.contains("<b>Categories:</b> Repair, Design"));
        assert!(body.contains("Kitchen &lt;renovation&gt;"));
        assert!(body.contains("May &amp; June"));
        assert!(body.contains("<b>Budget:</b> 5000"));
        assert!(!body.contains("City"));
        assert!(!body.contains("Contact"));
        assert!(!body.contains("\n\n\n"));
    }

    #[test]
    fn test_question_body() {
        let mut question = order();
        question.kind = RequestKind::Question;
        question.title = None;
        question.details = Some("Two floors".to_string());

        let body = request_notification(&question, &[]);
        assert!(body.starts_with("❓ <b>New question!</b>"));
        assert!(body.contains("Not specified"));
        assert!(body.ends_with("📋 <b>Details:</b>\nTwo floors"));
        assert!(!body.contains("Budget"));
    }

    #[test]
    fn test_summary_fallback_when_no_links() {
        let message = requester_summary(RequestKind::Order, 2, &[]);
        assert!(message.contains("sent to 2 partners"));
        assert!(message.ends_with(LINKS_LATER));
    }

    #[test]
    fn test_summary_lists_links() {
        let links = vec![SummaryLink {
            name: "Anna & Co".to_string(),
            url: "https://t.me/refdir/12".to_string(),
        }];
        let message = requester_summary(RequestKind::Question, 1, &links);
        assert!(message.contains("Your question was sent to 1 partner."));
        assert!(message.contains("<a href=\"https://t.me/refdir/12\">Anna &amp; Co</a>"));
    }

    #[test]
    fn test_card_caption_layout() {
        let mut anna = partner();
        anna.agency_name = Some("Studio & Co".to_string());
        anna.agency_description = Some("Interiors".to_string());
        anna.self_description = Some("Ten years of practice".to_string());
        anna.youtube = Some("https://youtube.com/@anna".to_string());
        anna.tg_video = Some("@anna_video".to_string());
        anna.office_address = Some("Main st. 1".to_string());

        let caption = partner_card_caption(&anna, &[category("Design"), category("Repair")]);

        assert_eq!(
            caption,
            "👤 <b>Anna</b>\n💼 Architect\n\n\
             🏢 <b>Studio &amp; Co</b>\nInteriors\n\n\
             📝 Ten years of practice\n\n\
             🏷️ <i>Design, Repair</i>\n\n\
             📞 <b>Contacts:</b>\n\
             💬 <a href=\"https://t.me/anna_arch\">Telegram</a>\n\
             🌐 <a href=\"https://anna.example\">Website</a>\n\
             ▶️ <a href=\"https://youtube.com/@anna\">YouTube</a> | <a href=\"https://t.me/anna_video\">TG Video</a>\n\
             🏠 Main st. 1"
        );
    }

    #[test]
    fn test_long_description_is_shortened_before_markup() {
        let mut anna = partner();
        anna.self_description = Some("x".repeat(960));
        let categories: Vec<Category> = (0..5)
            .map(|i| category(&format!("Category number {}", i)))
            .collect();

        let caption = partner_card_caption(&anna, &categories);

        assert!(char_len(&caption) <= CAPTION_LIMIT);
        assert_well_formed(&caption);
        assert!(caption.contains("x…\n\n🏷️ <i>Category number 0"));
        assert!(caption.ends_with("<a href=\"https://anna.example\">Website</a>"));
    }

    #[test]
    fn test_long_escaped_descriptions_never_split_entities() {
        let mut anna = partner();
        anna.agency_name = Some("A&B".to_string());
        anna.agency_description = Some("<tag> & ".repeat(200));
        anna.self_description = Some("\"quoted\" ".repeat(200));

        let caption = partner_card_caption(&anna, &[category("R&D")]);

        assert!(char_len(&caption) <= CAPTION_LIMIT);
        assert_well_formed(&caption);
        assert!(caption.contains("<i>R&amp;D</i>"));
        assert!(caption.contains("📞 <b>Contacts:</b>"));
    }

    #[test]
    fn test_oversized_fixed_sections_are_cut_at_a_line() {
        let mut anna = partner();
        anna.self_description = Some("about".to_string());
        let categories: Vec<Category> = (0..200)
            .map(|i| category(&format!("Category {}", i)))
            .collect();

        let caption = partner_card_caption(&anna, &categories);

        assert!(char_len(&caption) <= CAPTION_LIMIT);
        assert_well_formed(&caption);
        assert!(caption.starts_with("👤 <b>Anna</b>"));
        assert!(!caption.contains("📝"));
    }
}
