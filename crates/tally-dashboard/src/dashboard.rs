//! The parking-citation dashboard: five filterable charts, two number
//! displays, a hotspot table and a hex-bin overlay, all views of one
//! cross-filter.

use crate::citation::Citation;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::loader::{DatasetLoader, LoaderStats};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use tally_engine::{
    ChangeListener, ChangeSet, Count, CountAndSum, CountSum, Crossfilter, EngineError, Filter,
    FilterRequests, GeoPoint, GroupHandle, Key, LatestPoints, RecordStore, SpatialJoin,
    TotalHandle,
};

/// Filterable charts. The hotspot table and number displays never filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Chart {
    Time,
    TicketType,
    Agency,
    DayHour,
    Zipcode,
}

impl Chart {
    pub const ALL: [Chart; 5] = [
        Chart::Time,
        Chart::TicketType,
        Chart::Agency,
        Chart::DayHour,
        Chart::Zipcode,
    ];

    /// Element id the chart is anchored to.
    pub fn id(self) -> &'static str {
        match self {
            Chart::Time => "time-chart",
            Chart::TicketType => "ticket-type-row-chart",
            Chart::Agency => "agency-row-chart",
            Chart::DayHour => "day-hour-chart",
            Chart::Zipcode => "zipcode-row-chart",
        }
    }

    pub fn dimension(self) -> &'static str {
        match self {
            Chart::Time => dims::TIME,
            Chart::TicketType => dims::TICKET_TYPE,
            Chart::Agency => dims::AGENCY,
            Chart::DayHour => dims::DAY_HOUR,
            Chart::Zipcode => dims::ZIPCODE,
        }
    }
}

impl FromStr for Chart {
    type Err = DashboardError;

    fn from_str(id: &str) -> Result<Self> {
        Chart::ALL
            .into_iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| DashboardError::UnknownChart(id.to_string()))
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Dimension ids registered by [`Dashboard`].
pub mod dims {
    pub const TIME: &str = "time";
    pub const ZIPCODE: &str = "zipcode";
    pub const TICKET_TYPE: &str = "ticket_type";
    pub const DAY_HOUR: &str = "day_hour";
    pub const AGENCY: &str = "agency";
    pub const HOTSPOT: &str = "hotspot";
}

pub const DAY_LABELS: [&str; 7] = ["M", "T", "W", "Th", "F", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub tickets: u64,
    pub revenue: f64,
}

impl From<CountSum> for Totals {
    fn from(cs: CountSum) -> Self {
        Self {
            tickets: cs.count,
            revenue: cs.total.to_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub label: String,
    pub tickets: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBin {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub tickets: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatCell {
    /// Monday = 0.
    pub day: u8,
    pub hour: u8,
    pub tickets: u64,
}

impl HeatCell {
    pub fn day_label(&self) -> &'static str {
        DAY_LABELS.get(self.day as usize).copied().unwrap_or("?")
    }

    pub fn hour_label(&self) -> String {
        format!("{:02}:00", self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotspot {
    pub location: String,
    pub zip: String,
    pub description: String,
    pub tickets: u64,
}

fn serialize_timestamp<S: serde::Serializer>(ts: &NaiveDateTime, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(&ts.format("%Y-%m-%d %H:%M:%S"))
}

struct Groups {
    time: GroupHandle<u64>,
    zipcode: GroupHandle<u64>,
    ticket_type: GroupHandle<u64>,
    day_hour: GroupHandle<u64>,
    agency: GroupHandle<u64>,
    hotspot: GroupHandle<u64>,
    totals: TotalHandle<CountSum>,
}

type ResetFlags = Rc<RefCell<BTreeMap<Chart, bool>>>;

/// Refreshes a chart's reset flag whenever its own filter changes.
struct ResetTracker {
    flags: ResetFlags,
}

impl ChangeListener<Citation> for ResetTracker {
    fn on_change(&mut self, change: &ChangeSet, view: &Crossfilter<Citation>, _requests: &mut FilterRequests) {
        let mut flags = self.flags.borrow_mut();
        for chart in Chart::ALL {
            if change.modified.iter().any(|d| d == chart.dimension()) {
                let active = view.has_filter(chart.dimension()).unwrap_or(false);
                flags.insert(chart, active);
            }
        }
    }
}

pub struct Dashboard {
    cf: Crossfilter<Citation>,
    groups: Groups,
    time_domain: (NaiveDateTime, NaiveDateTime),
    reset_flags: ResetFlags,
    overlay: Rc<RefCell<LatestPoints>>,
    hotspot_rows: usize,
}

impl Dashboard {
    pub fn new(store: RecordStore<Citation>, config: &DashboardConfig) -> Result<Self> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("dashboard_init", records = store.len()).entered();

        let mut cf = Crossfilter::with_config(store, config.engine.clone());
        cf.register_dimension(dims::TIME, |c: &Citation| Key::from(c.timestamp))?;
        cf.register_dimension(dims::ZIPCODE, |c: &Citation| Key::text(c.zip.as_str()))?;
        cf.register_dimension(dims::TICKET_TYPE, |c: &Citation| {
            Key::text(c.description.as_str())
        })?;
        cf.register_dimension(dims::DAY_HOUR, |c: &Citation| Key::from((c.dayofweek, c.hour)))?;
        cf.register_dimension(dims::AGENCY, |c: &Citation| Key::text(c.agency.as_str()))?;
        cf.register_dimension(dims::HOTSPOT, |c: &Citation| {
            Key::from((c.location.as_str(), c.zip.as_str(), c.description.as_str()))
        })?;

        let groups = Groups {
            time: cf.register_group("tickets_by_time", dims::TIME, Count, true)?,
            zipcode: cf.register_group("tickets_by_zipcode", dims::ZIPCODE, Count, true)?,
            ticket_type: cf.register_group("tickets_by_type", dims::TICKET_TYPE, Count, true)?,
            day_hour: cf.register_group("tickets_by_day_hour", dims::DAY_HOUR, Count, true)?,
            agency: cf.register_group("tickets_by_agency", dims::AGENCY, Count, true)?,
            // the table has no filter of its own and follows every chart
            hotspot: cf.register_group("tickets_by_block", dims::HOTSPOT, Count, false)?,
            totals: cf.register_group_all("totals", CountAndSum::new(|c: &Citation| c.fine))?,
        };

        let time = cf.dimension(dims::TIME)?;
        let time_domain = time
            .min_key()
            .and_then(Key::as_timestamp)
            .zip(time.max_key().and_then(Key::as_timestamp))
            .ok_or_else(EngineError::empty_dataset)?;

        let reset_flags: ResetFlags =
            Rc::new(RefCell::new(Chart::ALL.into_iter().map(|c| (c, false)).collect()));
        cf.on_change(ResetTracker {
            flags: Rc::clone(&reset_flags),
        });

        let overlay = Rc::new(RefCell::new(LatestPoints::default()));
        let mut join = SpatialJoin::new(Citation::position, Rc::clone(&overlay));
        join.prime(&cf);
        cf.on_change(join);

        Ok(Self {
            cf,
            groups,
            time_domain,
            reset_flags,
            overlay,
            hotspot_rows: config.hotspot_rows,
        })
    }

    /// Load every path (CSV or JSON by extension) and build the dashboard.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P], config: &DashboardConfig) -> Result<(Self, LoaderStats)> {
        let mut loader = DatasetLoader::new().with_normalize(config.normalize.clone());
        for path in paths {
            loader.add_path(path.as_ref())?;
        }
        let store = loader.load()?;
        let dashboard = Self::new(store, config)?;
        Ok((dashboard, loader.stats().clone()))
    }

    pub fn crossfilter(&self) -> &Crossfilter<Citation> {
        &self.cf
    }

    /// Register an extra view on the underlying cross-filter.
    pub fn on_change(&mut self, listener: impl ChangeListener<Citation> + 'static) {
        self.cf.on_change(listener);
    }

    /* ───────────────────────── interactions ───────────────────────── */

    pub fn filter_chart(&mut self, chart: Chart, filter: Filter) -> Result<ChangeSet> {
        #[cfg(feature = "tracing")]
        tracing::debug!(chart = chart.id(), ?filter, "filter chart");
        Ok(self.cf.set_filter(chart.dimension(), filter)?)
    }

    /// Brush the time chart to `[from, to)`.
    pub fn select_time(&mut self, from: NaiveDateTime, to: NaiveDateTime) -> Result<ChangeSet> {
        self.filter_chart(Chart::Time, Filter::range(from, to))
    }

    pub fn select_zips<'a>(&mut self, codes: impl IntoIterator<Item = &'a str>) -> Result<ChangeSet> {
        self.filter_chart(Chart::Zipcode, Filter::one_of(codes))
    }

    pub fn select_ticket_types<'a>(&mut self, types: impl IntoIterator<Item = &'a str>) -> Result<ChangeSet> {
        self.filter_chart(Chart::TicketType, Filter::one_of(types))
    }

    pub fn select_agencies<'a>(&mut self, agencies: impl IntoIterator<Item = &'a str>) -> Result<ChangeSet> {
        self.filter_chart(Chart::Agency, Filter::one_of(agencies))
    }

    /// Select heat-map cells as `(day, hour)` pairs.
    pub fn select_day_hours(&mut self, cells: impl IntoIterator<Item = (u8, u8)>) -> Result<ChangeSet> {
        self.filter_chart(Chart::DayHour, Filter::one_of(cells))
    }

    /// Current zip selection, in key order. Empty when the zip chart is unfiltered.
    pub fn zip_selection(&self) -> Result<Vec<String>> {
        let keys: Vec<&Key> = match self.cf.filter(dims::ZIPCODE)? {
            Filter::Exact(k) => vec![k],
            Filter::In(set) => set.iter().collect(),
            _ => Vec::new(),
        };
        Ok(keys.into_iter().map(Key::to_string).collect())
    }

    /// Map click: add `code` to the zip selection, or drop it if already selected.
    /// Dropping the last code clears the zip filter.
    pub fn toggle_zip(&mut self, code: &str) -> Result<ChangeSet> {
        let mut selected: BTreeSet<String> = self.zip_selection()?.into_iter().collect();
        if !selected.remove(code) {
            selected.insert(code.to_string());
        }
        self.filter_chart(Chart::Zipcode, Filter::one_of(selected))
    }

    /// Clear one chart's filter, by its element id.
    pub fn reset_chart(&mut self, id: &str) -> Result<ChangeSet> {
        let chart: Chart = id.parse()?;
        Ok(self.cf.clear_filter(chart.dimension())?)
    }

    pub fn reset_all(&mut self) -> Result<ChangeSet> {
        Ok(self.cf.clear_all()?)
    }

    /* ───────────────────────── view state ───────────────────────── */

    pub fn show_reset_all(&self) -> bool {
        self.cf.has_any_active_filter()
    }

    pub fn reset_flag(&self, chart: Chart) -> bool {
        self.reset_flags.borrow().get(&chart).copied().unwrap_or(false)
    }

    /// Reset flag per chart id.
    pub fn reset_flags(&self) -> BTreeMap<&'static str, bool> {
        self.reset_flags
            .borrow()
            .iter()
            .map(|(chart, on)| (chart.id(), *on))
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.cf.visible_count()
    }

    pub fn totals(&self) -> Result<Totals> {
        Ok((*self.cf.total(&self.groups.totals)?).into())
    }

    /// Earliest and latest timestamp in the whole dataset.
    pub fn time_domain(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.time_domain
    }

    pub fn time_series(&self) -> Result<Vec<TimeBin>> {
        Ok(self
            .cf
            .group_result(&self.groups.time)?
            .iter()
            .filter_map(|(k, v)| {
                Some(TimeBin {
                    timestamp: k.as_timestamp()?,
                    tickets: *v,
                })
            })
            .collect())
    }

    pub fn zip_rows(&self) -> Result<Vec<Row>> {
        self.pinned_rows(&self.groups.zipcode)
    }

    pub fn ticket_type_rows(&self) -> Result<Vec<Row>> {
        self.pinned_rows(&self.groups.ticket_type)
    }

    pub fn agency_rows(&self) -> Result<Vec<Row>> {
        self.pinned_rows(&self.groups.agency)
    }

    /// Row charts keep the order they had before any filter was applied.
    fn pinned_rows(&self, handle: &GroupHandle<u64>) -> Result<Vec<Row>> {
        Ok(self
            .cf
            .pinned_result(handle)?
            .into_iter()
            .map(|(k, v)| Row {
                label: k.to_string(),
                tickets: *v,
            })
            .collect())
    }

    /// Every (day, hour) cell present in the data, in day then hour order.
    pub fn heat_cells(&self) -> Result<Vec<HeatCell>> {
        Ok(self
            .cf
            .group_result(&self.groups.day_hour)?
            .iter()
            .filter_map(|(k, v)| {
                let day = u8::try_from(k.component(0)?.as_i64()?).ok()?;
                let hour = u8::try_from(k.component(1)?.as_i64()?).ok()?;
                Some(HeatCell {
                    day,
                    hour,
                    tickets: *v,
                })
            })
            .collect())
    }

    /// Busiest street blocks, most tickets first. Blocks with no visible
    /// tickets are left out.
    pub fn hotspots(&self) -> Result<Vec<Hotspot>> {
        let top = self.cf.top(&self.groups.hotspot, self.hotspot_rows)?;
        Ok(top
            .into_iter()
            .filter(|(_, v)| **v > 0)
            .filter_map(|(k, v)| {
                let part = |i: usize| k.component(i).and_then(Key::as_str).map(str::to_string);
                Some(Hotspot {
                    location: part(0)?,
                    zip: part(1)?,
                    description: part(2)?,
                    tickets: *v,
                })
            })
            .collect())
    }

    /// Points last published to the hex-bin overlay.
    pub fn overlay_points(&self) -> Vec<GeoPoint> {
        self.overlay.borrow().points.clone()
    }
}
