use notelens_protocol::{DailyCount, HeatmapCell, Note, PatternSection};
use std::collections::{BTreeMap, HashMap};

/// Count notes per `(dow, hour)` cell. Cells are emitted in the order they are
/// first seen; empty cells are never emitted.
pub fn heatmap(notes: &[Note]) -> Vec<HeatmapCell> {
    let mut slots: HashMap<(u8, u8), usize> = HashMap::new();
    let mut cells: Vec<HeatmapCell> = Vec::new();

    for note in notes {
        let key = (note.dow, note.hour);
        match slots.get(&key) {
            Some(&slot) => cells[slot].count += 1,
            None => {
                slots.insert(key, cells.len());
                cells.push(HeatmapCell {
                    dow: note.dow,
                    hour: note.hour,
                    count: 1,
                });
            }
        }
    }

    cells
}

/// Count notes per UTC calendar day, ascending by date.
pub fn daily_count(notes: &[Note]) -> Vec<DailyCount> {
    let mut days: BTreeMap<String, usize> = BTreeMap::new();
    for note in notes {
        *days.entry(note.date_key()).or_default() += 1;
    }

    days.into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

pub fn analyze(notes: &[Note]) -> PatternSection {
    PatternSection {
        heatmap: heatmap(notes),
        daily_count: daily_count(notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn note_at(day: u32, hour: u32) -> Note {
        Note::from_instant(
            format!("{day}-{hour}"),
            Utc.with_ymd_and_hms(2024, 6, day, hour, 10, 0).unwrap(),
            "text",
            Vec::new(),
        )
    }

    #[test]
    fn groups_by_weekday_and_hour() {
        // 2024-06-02 Sunday, 2024-06-03 Monday, 2024-06-09 Sunday.
        let notes = vec![note_at(2, 23), note_at(3, 9), note_at(9, 23)];
        assert_eq!(
            heatmap(&notes),
            vec![
                HeatmapCell { dow: 7, hour: 23, count: 2 },
                HeatmapCell { dow: 1, hour: 9, count: 1 },
            ]
        );
    }

    #[test]
    fn daily_counts_are_sorted_by_date() {
        let notes = vec![note_at(9, 1), note_at(2, 5), note_at(9, 3), note_at(3, 7)];
        let days = daily_count(&notes);
        assert_eq!(
            days,
            vec![
                DailyCount { date: "2024-06-02".to_string(), count: 1 },
                DailyCount { date: "2024-06-03".to_string(), count: 1 },
                DailyCount { date: "2024-06-09".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn no_notes_is_an_empty_section() {
        assert_eq!(analyze(&[]), PatternSection::default());
    }

    proptest! {
        #[test]
        fn proptest_counts_sum_to_note_count(
            slots in proptest::collection::vec((1u32..29, 0u32..24), 0..60)
        ) {
            let notes: Vec<Note> = slots.iter().map(|&(d, h)| note_at(d, h)).collect();
            let section = analyze(&notes);
            let heat: usize = section.heatmap.iter().map(|c| c.count).sum();
            let daily: usize = section.daily_count.iter().map(|c| c.count).sum();
            prop_assert_eq!(heat, notes.len());
            prop_assert_eq!(daily, notes.len());
            prop_assert!(section.heatmap.iter().all(|c| c.count > 0));
            prop_assert!(section.heatmap.iter().all(|c| (1..=7).contains(&c.dow)));
        }
    }
}
