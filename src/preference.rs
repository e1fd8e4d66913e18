//! Normalisation of raw teacher preference lists into a bipartite graph.
//!
//! Teachers and courses are re-indexed densely in ascending identity order,
//! so index order on either side is the tie-break order used by the solver.

use crate::data::{Course, CourseId, TeacherId};
use crate::error::PreferenceError;
use itertools::Itertools;
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Preference strength of a teacher for one course.
pub type RankScore = u32;

/// A candidate edge from a teacher to a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub course: usize,
    pub score: RankScore,
}

/// Validated preference graph.
#[derive(Debug, Clone)]
pub struct PreferenceGraph {
    teachers: Vec<TeacherId>,
    courses: Vec<CourseId>,
    /// Per teacher, edges in the submitted preference order.
    edges: Vec<Vec<Edge>>,
}

impl PreferenceGraph {
    /// Validates `request` against the current course set.
    ///
    /// Every listed course must exist and appear at most once per teacher.
    /// Courses already bound to another teacher stay valid references but
    /// are not candidates.
    pub fn build(
        request: &BTreeMap<TeacherId, Vec<CourseId>>,
        courses: &[Course],
    ) -> Result<Self, PreferenceError> {
        if request.is_empty() {
            return Err(PreferenceError::EmptyRequest);
        }

        let known: HashMap<&CourseId, &Course> = courses.iter().map(|c| (&c.id, c)).collect();

        for (teacher, wanted) in request {
            let mut seen = HashSet::with_capacity(wanted.len());
            for course in wanted {
                if !seen.insert(course) {
                    return Err(PreferenceError::DuplicatePreference {
                        teacher: teacher.clone(),
                        course: course.clone(),
                    });
                }
                if !known.contains_key(course) {
                    return Err(PreferenceError::InvalidCourseReference {
                        teacher: teacher.clone(),
                        course: course.clone(),
                    });
                }
            }
        }

        let course_ids: Vec<CourseId> = request
            .values()
            .flatten()
            .unique()
            .sorted()
            .cloned()
            .collect();
        let course_index: HashMap<&CourseId, usize> =
            course_ids.iter().enumerate().map(|(i, c)| (c, i)).collect();

        // BTreeMap iteration is already ascending by identity.
        let teachers: Vec<TeacherId> = request.keys().cloned().collect();
        let mut edges = Vec::with_capacity(teachers.len());
        for (teacher, wanted) in request {
            let len = wanted.len() as RankScore;
            let list: Vec<Edge> = wanted
                .iter()
                .enumerate()
                .filter(|(_, course)| match &known[course].teacher {
                    Some(bound) if bound != teacher => {
                        trace!("course {course} is bound to {bound}, not a candidate for {teacher}");
                        false
                    }
                    _ => true,
                })
                .map(|(pos, course)| Edge {
                    course: course_index[course],
                    score: len - pos as RankScore,
                })
                .collect();
            edges.push(list);
        }

        debug!(
            "Preference graph: {} teachers, {} courses, {} candidate edges",
            teachers.len(),
            course_ids.len(),
            edges.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            teachers,
            courses: course_ids,
            edges,
        })
    }

    pub fn teachers(&self) -> &[TeacherId] {
        &self.teachers
    }

    pub fn courses(&self) -> &[CourseId] {
        &self.courses
    }

    pub fn edges(&self, teacher: usize) -> &[Edge] {
        &self.edges[teacher]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Rank score of `teacher` for `course`, if it is a candidate.
    pub fn score(&self, teacher: usize, course: usize) -> Option<RankScore> {
        self.edges[teacher]
            .iter()
            .find(|e| e.course == course)
            .map(|e| e.score)
    }
}
