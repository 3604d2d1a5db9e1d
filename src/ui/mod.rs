//! Plain-text rendering of tracks and queues for chat replies.

use serenity::model::mention::Mentionable;
use std::time::Duration;

use crate::audio::track::Track;

/// One page of a guild's queue.
#[derive(Debug, Clone)]
pub struct QueuePage<'a> {
    pub items: &'a [Track],
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// 0-based index of `items[0]` in the whole queue
    pub offset: usize,
}

/// Slices `queue` into the requested 1-based page.
pub fn page(queue: &[Track], page: usize, items_per_page: usize) -> QueuePage<'_> {
    let items_per_page = items_per_page.max(1);
    let total_pages = if queue.is_empty() {
        1
    } else {
        queue.len().div_ceil(items_per_page)
    };
    let current_page = page.clamp(1, total_pages);
    let start = (current_page - 1) * items_per_page;
    let end = (start + items_per_page).min(queue.len());

    QueuePage {
        items: &queue[start.min(queue.len())..end],
        current_page,
        total_pages,
        total_items: queue.len(),
        offset: start,
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn track_length(track: &Track) -> String {
    if track.info().is_stream {
        "LIVE".to_string()
    } else {
        format_duration(track.length())
    }
}

fn requester(track: &Track) -> String {
    track
        .requester()
        .map(|user| user.mention().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn now_playing(track: &Track, position: Option<Duration>) -> String {
    format!(
        "Currently playing: {}\nDuration: {}/{}\nRequester: {}",
        track.title(),
        format_duration(position.unwrap_or_default()),
        track_length(track),
        requester(track),
    )
}

pub fn track_added(track: &Track) -> String {
    format!(
        "Added to queue: {}\nRequested by: {}",
        track.title(),
        requester(track)
    )
}

/// Numbered listing of one queue page with the total remaining time.
pub fn queue_listing(current: Option<&Track>, queue: &[Track], page_number: usize) -> String {
    let mut out = String::new();

    match current {
        Some(track) => out.push_str(&format!("Now: {} [{}]\n", track.title(), track_length(track))),
        None => out.push_str("Now: nothing\n"),
    }

    if queue.is_empty() {
        out.push_str("Queue is empty");
        return out;
    }

    let page = page(queue, page_number, 10);
    for (i, track) in page.items.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} [{}] - {}\n",
            page.offset + i + 1,
            track.title(),
            track_length(track),
            requester(track),
        ));
    }

    let total: Duration = queue.iter().map(Track::length).sum();
    out.push_str(&format!(
        "Page {}/{} - {} tracks, {} total",
        page.current_page,
        page.total_pages,
        page.total_items,
        humantime::format_duration(Duration::from_secs(total.as_secs())),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::test_track;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(3 * 60 + 5)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3600 + 61)), "1:01:01");
    }

    #[test]
    fn test_paging_clamps_out_of_range_pages() {
        let queue: Vec<_> = (0..25).map(|i| test_track(&format!("t{i}"))).collect();

        let last = page(&queue, 99, 10);
        assert_eq!((last.current_page, last.total_pages), (3, 3));
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.offset, 20);

        let empty = page(&[], 0, 10);
        assert_eq!((empty.current_page, empty.total_pages, empty.items.len()), (1, 1, 0));
    }

    #[test]
    fn test_now_playing_mentions_requester() {
        let track = test_track("song").with_requester(UserId::new(191231307290771456));
        let text = now_playing(&track, Some(Duration::from_secs(30)));

        assert_eq!(
            text,
            "Currently playing: song\nDuration: 0:30/3:00\nRequester: <@191231307290771456>"
        );
    }

    #[test]
    fn test_queue_listing_numbers_tracks() {
        let queue = vec![test_track("b"), test_track("c")];
        let text = queue_listing(Some(&test_track("a")), &queue, 1);

        assert!(text.starts_with("Now: a [3:00]\n1. b [3:00] - unknown\n2. c [3:00] - unknown\n"));
        assert!(text.ends_with("Page 1/1 - 2 tracks, 6m total"));
    }
}
