//! Tagging graph: a single-pass index over event records.
//!
//! Every derived question the resolver asks (which department is a user in,
//! which departments did they tag, who tagged a department, which edges
//! connect two parties) is answered from this index without rescanning the
//! events.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::event::{EventRecord, TaggingEdge};

/// Derived tagging graph for one snapshot of events.
#[derive(Debug, Default)]
pub struct TaggingIndex {
  edges:            Vec<TaggingEdge>,
  /// author email → (created_at, department) of their earliest event.
  first_department: HashMap<String, (DateTime<Utc>, String)>,
  /// department → departments its members' events tagged.
  dept_tagged:      HashMap<String, BTreeSet<String>>,
  /// department → authors of events that tagged it.
  taggers:          HashMap<String, BTreeSet<String>>,
  /// author email → departments their events tagged.
  user_tagged:      HashMap<String, BTreeSet<String>>,
  /// (author email, target department) → indices into `edges`.
  by_pair:          HashMap<(String, String), Vec<usize>>,
}

impl TaggingIndex {
  /// Build the index in one pass over `events`.
  ///
  /// One edge is produced per (event, tagged department) pair; a department
  /// listed twice by the same event yields a single edge. Blank department
  /// names are ignored.
  pub fn build(events: &[EventRecord]) -> Self {
    let mut index = Self::default();

    for event in events {
      let author = event.author_email.as_str();
      let from = event.author_department.trim();

      if !from.is_empty() {
        let replace = match index.first_department.get(author) {
          Some((at, _)) => event.created_at < *at,
          None => true,
        };
        if replace {
          index
            .first_department
            .insert(author.to_owned(), (event.created_at, from.to_owned()));
        }
      }

      let mut seen = BTreeSet::new();
      for req in &event.tagged {
        let to = req.department_name.trim();
        if to.is_empty() || !seen.insert(to) {
          continue;
        }

        if !from.is_empty() {
          index
            .dept_tagged
            .entry(from.to_owned())
            .or_default()
            .insert(to.to_owned());
        }
        index
          .taggers
          .entry(to.to_owned())
          .or_default()
          .insert(author.to_owned());
        index
          .user_tagged
          .entry(author.to_owned())
          .or_default()
          .insert(to.to_owned());
        index
          .by_pair
          .entry((author.to_owned(), to.to_owned()))
          .or_default()
          .push(index.edges.len());

        index.edges.push(TaggingEdge {
          from_user_email: author.to_owned(),
          from_department: from.to_owned(),
          to_department:   to.to_owned(),
          event_id:        event.event_id,
          event_title:     event.title.clone(),
          timestamp:       event.created_at,
        });
      }
    }

    tracing::debug!(
      events = events.len(),
      edges = index.edges.len(),
      authors = index.first_department.len(),
      "built tagging index"
    );
    index
  }

  /// A user's department: the one recorded on their earliest authored event,
  /// else `fallback`. `None` means the user contributes nothing.
  pub fn department_of<'a>(
    &'a self,
    email: &str,
    fallback: Option<&'a str>,
  ) -> Option<&'a str> {
    self
      .first_department
      .get(email)
      .map(|(_, d)| d.as_str())
      .or(fallback)
  }

  /// Every tagging edge, in event order.
  pub fn edges(&self) -> &[TaggingEdge] { &self.edges }

  /// Departments tagged by events authored from within `department`.
  pub fn departments_tagged_by(&self, department: &str) -> Option<&BTreeSet<String>> {
    self.dept_tagged.get(department)
  }

  /// Authors of events that tagged `department`.
  pub fn taggers_of(&self, department: &str) -> Option<&BTreeSet<String>> {
    self.taggers.get(department)
  }

  /// Departments tagged by events `email` authored.
  pub fn departments_tagged_by_user(&self, email: &str) -> Option<&BTreeSet<String>> {
    self.user_tagged.get(email)
  }

  /// Edges from events authored by `email` that tagged `department`.
  pub fn edges_between<'a>(
    &'a self,
    email: &str,
    department: &str,
  ) -> impl Iterator<Item = &'a TaggingEdge> + use<'a> {
    self
      .by_pair
      .get(&(email.to_owned(), department.to_owned()))
      .into_iter()
      .flatten()
      .map(|&i| &self.edges[i])
  }
}
