use crate::data::{Course, CourseId, TeacherId};
use crate::error::SolveError;
use crate::preference::{PreferenceGraph, RankScore};
use log::{debug, info, trace};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Outcome of one scheduling call. Every requesting teacher is present,
/// mapped to `None` when no course could be given to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentResult {
    pub assignments: BTreeMap<TeacherId, Option<CourseId>>,
    pub total_score: u64,
}

impl AssignmentResult {
    pub fn course_of(&self, teacher: &TeacherId) -> Option<&CourseId> {
        self.assignments.get(teacher).and_then(Option::as_ref)
    }

    pub fn assigned(&self) -> impl Iterator<Item = (&TeacherId, &CourseId)> {
        self.assignments
            .iter()
            .filter_map(|(t, c)| c.as_ref().map(|c| (t, c)))
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &TeacherId> {
        self.assignments
            .iter()
            .filter(|(_, c)| c.is_none())
            .map(|(t, _)| t)
    }
}

/// Validates the request and solves the teacher/course assignment.
pub fn solve(
    request: &BTreeMap<TeacherId, Vec<CourseId>>,
    courses: &[Course],
) -> Result<AssignmentResult, SolveError> {
    let graph = PreferenceGraph::build(request, courses)?;
    solve_graph(&graph)
}

/// Maximum total rank score matching over a validated graph.
///
/// Among matchings with the same score the one assigning more teachers
/// wins. Remaining ties go to teachers in ascending identity, each taking
/// the smallest course identity that still admits an optimal completion.
pub fn solve_graph(graph: &PreferenceGraph) -> Result<AssignmentResult, SolveError> {
    let start_time = Instant::now();
    if graph.edge_count() == 0 {
        return Err(SolveError::NoFeasibleAssignment);
    }

    info!(
        "Solving assignment for {} teachers over {} courses...",
        graph.teachers().len(),
        graph.courses().len()
    );

    let matcher = Matcher::new(graph);
    let all_teachers: Vec<usize> = (0..graph.teachers().len()).collect();
    let mut free_courses = vec![true; graph.courses().len()];
    let mut remaining = matcher.max_weight(&all_teachers, &free_courses);
    debug!("Optimal composite weight {remaining}");

    let mut chosen: Vec<Option<usize>> = vec![None; graph.teachers().len()];
    for (t, slot) in chosen.iter_mut().enumerate() {
        let rest = &all_teachers[t + 1..];
        let mut candidates: Vec<usize> = graph
            .edges(t)
            .iter()
            .map(|e| e.course)
            .filter(|&c| free_courses[c])
            .collect();
        candidates.sort_unstable();

        for c in candidates {
            let w = matcher.weight(t, c);
            free_courses[c] = false;
            if w + matcher.max_weight(rest, &free_courses) == remaining {
                trace!("fixed {} -> {}", graph.teachers()[t], graph.courses()[c]);
                *slot = Some(c);
                remaining -= w;
                break;
            }
            free_courses[c] = true;
        }
    }
    debug_assert_eq!(remaining, 0);

    let mut total_score = 0u64;
    let assignments = graph
        .teachers()
        .iter()
        .zip(&chosen)
        .enumerate()
        .map(|(t, (teacher, course))| {
            let course = course.map(|c| {
                total_score += u64::from(graph.score(t, c).unwrap_or(0));
                graph.courses()[c].clone()
            });
            (teacher.clone(), course)
        })
        .collect();

    let result = AssignmentResult {
        assignments,
        total_score,
    };
    info!(
        "Assignment found in {:.2?}: {} assigned, {} unassigned, total score {}",
        start_time.elapsed(),
        result.assigned().count(),
        result.unassigned().count(),
        result.total_score
    );
    Ok(result)
}

/// Successive shortest augmenting paths on the residual bipartite graph.
///
/// Each edge carries the composite weight `score * (T + 1) + 1`, so the
/// number of matched teachers (at most `T`) only decides between
/// matchings of equal score.
struct Matcher {
    /// Per teacher, `(course, composite weight)`.
    adjacency: Vec<Vec<(usize, i64)>>,
    courses: usize,
}

impl Matcher {
    fn new(graph: &PreferenceGraph) -> Self {
        let scale = graph.teachers().len() as i64 + 1;
        let adjacency = (0..graph.teachers().len())
            .map(|t| {
                graph
                    .edges(t)
                    .iter()
                    .map(|e| (e.course, composite(e.score, scale)))
                    .collect()
            })
            .collect();
        Self {
            adjacency,
            courses: graph.courses().len(),
        }
    }

    fn weight(&self, teacher: usize, course: usize) -> i64 {
        self.adjacency[teacher]
            .iter()
            .find(|(c, _)| *c == course)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    /// Weight of a maximum weight matching between `teachers` and the
    /// courses flagged in `available`.
    fn max_weight(&self, teachers: &[usize], available: &[bool]) -> i64 {
        let mut course_match: Vec<Option<usize>> = vec![None; self.courses];
        let mut teacher_match: Vec<Option<usize>> = vec![None; self.adjacency.len()];
        let mut total = 0;

        while let Some(gain) =
            self.augment(teachers, available, &mut teacher_match, &mut course_match)
        {
            total += gain;
        }
        total
    }

    /// Finds the shortest (most negative cost) augmenting path and applies
    /// it. Returns the weight gained, or `None` when no path improves the
    /// matching.
    fn augment(
        &self,
        teachers: &[usize],
        available: &[bool],
        teacher_match: &mut [Option<usize>],
        course_match: &mut [Option<usize>],
    ) -> Option<i64> {
        const INF: i64 = i64::MAX / 4;
        let mut teacher_dist = vec![INF; self.adjacency.len()];
        let mut course_dist = vec![INF; self.courses];
        // predecessor teacher for each course on the best path
        let mut course_pred: Vec<Option<usize>> = vec![None; self.courses];

        for &t in teachers {
            if teacher_match[t].is_none() {
                teacher_dist[t] = 0;
            }
        }

        // Bellman-Ford; the residual graph has no negative cycle because the
        // current matching is of maximum weight for its size.
        for _ in 0..=teachers.len() + self.courses {
            let mut changed = false;
            for &t in teachers {
                if teacher_dist[t] >= INF {
                    continue;
                }
                for &(c, w) in &self.adjacency[t] {
                    if !available[c] || teacher_match[t] == Some(c) {
                        continue;
                    }
                    let d = teacher_dist[t] - w;
                    if d < course_dist[c] {
                        course_dist[c] = d;
                        course_pred[c] = Some(t);
                        changed = true;
                    }
                }
            }
            for c in 0..self.courses {
                if course_dist[c] >= INF {
                    continue;
                }
                if let Some(t) = course_match[c] {
                    let d = course_dist[c] + self.weight(t, c);
                    if d < teacher_dist[t] {
                        teacher_dist[t] = d;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let (end, cost) = (0..self.courses)
            .filter(|&c| available[c] && course_match[c].is_none() && course_dist[c] < INF)
            .map(|c| (c, course_dist[c]))
            .min_by_key(|&(c, d)| (d, c))?;
        if cost >= 0 {
            return None;
        }

        // Walk back, flipping matched and unmatched edges.
        let mut c = end;
        loop {
            let t = course_pred[c]?;
            let previous = teacher_match[t];
            teacher_match[t] = Some(c);
            course_match[c] = Some(t);
            match previous {
                Some(p) => c = p,
                None => break,
            }
        }
        Some(-cost)
    }
}

fn composite(score: RankScore, scale: i64) -> i64 {
    i64::from(score) * scale + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courses(ids: &[&str]) -> Vec<Course> {
        ids.iter()
            .map(|id| Course {
                id: CourseId::from(*id),
                name: id.to_string(),
                capacity: 30,
                teacher: None,
                enrolled: 0,
            })
            .collect()
    }

    fn request(entries: &[(&str, &[&str])]) -> BTreeMap<TeacherId, Vec<CourseId>> {
        entries
            .iter()
            .map(|(t, cs)| {
                (
                    TeacherId::from(*t),
                    cs.iter().map(|c| CourseId::from(*c)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn prefers_global_allocation_over_first_come() {
        let req = request(&[("T1", &["C1", "C2"]), ("T2", &["C1"])]);
        let result = solve(&req, &courses(&["C1", "C2"])).unwrap();

        assert_eq!(result.course_of(&"T1".into()), Some(&"C2".into()));
        assert_eq!(result.course_of(&"T2".into()), Some(&"C1".into()));
        assert_eq!(result.total_score, 2);
    }

    #[test]
    fn equal_score_prefers_more_assignments() {
        // {T1:C1} and {T1:C2, T2:C1} both score 3.
        let req = request(&[("T1", &["C1", "C2", "C3"]), ("T2", &["C1"])]);
        let result = solve(&req, &courses(&["C1", "C2", "C3"])).unwrap();
        assert_eq!(result.total_score, 3);
        assert_eq!(result.course_of(&"T1".into()), Some(&"C2".into()));
        assert_eq!(result.course_of(&"T2".into()), Some(&"C1".into()));
    }

    #[test]
    fn higher_score_beats_more_assignments() {
        // Assigning all three teachers scores 3; leaving T2 out scores 4.
        let req = request(&[
            ("T1", &["C1", "C2", "C3"]),
            ("T2", &["C1"]),
            ("T3", &["C2"]),
        ]);
        let result = solve(&req, &courses(&["C1", "C2", "C3"])).unwrap();
        assert_eq!(result.total_score, 4);
        assert_eq!(result.course_of(&"T1".into()), Some(&"C1".into()));
        assert_eq!(result.course_of(&"T3".into()), Some(&"C2".into()));
        assert_eq!(result.course_of(&"T2".into()), None);
    }

    #[test]
    fn exhausted_teacher_is_unassigned() {
        let req = request(&[("1", &["1"]), ("2", &["1"]), ("3", &["1"])]);
        let result = solve(&req, &courses(&["1"])).unwrap();

        // all tie; lowest teacher identity wins
        assert_eq!(result.course_of(&"1".into()), Some(&"1".into()));
        assert_eq!(result.unassigned().count(), 2);
        assert_eq!(result.assignments.len(), 3);
    }

    #[test]
    fn ties_go_to_smallest_course_identity() {
        // Either allocation scores 3; teacher 1 picks first and course 9
        // precedes course 10.
        let req = request(&[("1", &["10", "9"]), ("2", &["10", "9"])]);
        let result = solve(&req, &courses(&["9", "10"])).unwrap();
        assert_eq!(result.total_score, 3);
        assert_eq!(result.course_of(&"1".into()), Some(&"9".into()));
        assert_eq!(result.course_of(&"2".into()), Some(&"10".into()));
    }

    #[test]
    fn symmetric_preferences_resolve_by_identity() {
        // Both teachers rank C1 then C2: swapping gives equal totals.
        let req = request(&[("2", &["1", "2"]), ("1", &["1", "2"])]);
        let result = solve(&req, &courses(&["1", "2"])).unwrap();
        assert_eq!(result.course_of(&"1".into()), Some(&"1".into()));
        assert_eq!(result.course_of(&"2".into()), Some(&"2".into()));
        assert_eq!(result.total_score, 3);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let req = request(&[
            ("4", &["1", "2", "3"]),
            ("3", &["3", "1"]),
            ("2", &["2", "3"]),
            ("1", &["1", "3", "2"]),
        ]);
        let catalog = courses(&["1", "2", "3"]);
        let first = solve(&req, &catalog).unwrap();
        for _ in 0..10 {
            assert_eq!(solve(&req, &catalog).unwrap(), first);
        }
    }

    #[test]
    fn no_candidate_edge_is_infeasible() {
        let req = request(&[("1", &[]), ("2", &[])]);
        let err = solve(&req, &courses(&["1"])).unwrap_err();
        assert_eq!(err, SolveError::NoFeasibleAssignment);
    }

    #[test]
    fn validation_errors_surface() {
        let err = solve(&BTreeMap::new(), &courses(&["1"])).unwrap_err();
        assert!(matches!(err, SolveError::Invalid(_)));
    }
}
