//! The host block's ports, handed to a Python label propagation override.
//!
//! `Ports` snapshots the input port and the output port names for one
//! `propagate_labels` call. Labels posted from Python are held here and
//! moved to the host's output ports once the override returns; after that
//! the object is closed and further posts raise.

use std::sync::Arc;

use proxy_core::{InputPort, Label, OutputPort};
use pyo3::exceptions::{PyKeyError, PyRuntimeError};
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTuple};

use crate::environment::PythonEnvironment;
use crate::error::raise;

#[pyclass(module = "proxy_bridge", name = "Ports")]
pub struct Ports {
    env: Arc<PythonEnvironment>,
    input: InputPort,
    outputs: Vec<String>,
    posted: Vec<(usize, Label)>,
    closed: bool,
}

impl Ports {
    pub(crate) fn new(
        env: Arc<PythonEnvironment>,
        input: &InputPort,
        outputs: &[OutputPort],
    ) -> Self {
        Self {
            env,
            input: input.clone(),
            outputs: outputs.iter().map(|port| port.name().to_string()).collect(),
            posted: Vec::new(),
            closed: false,
        }
    }

    /// Close the ports and take the posted labels with the index of the
    /// output each was posted to.
    pub(crate) fn finish(&mut self) -> Vec<(usize, Label)> {
        self.closed = true;
        std::mem::take(&mut self.posted)
    }
}

#[pymethods]
impl Ports {
    #[getter]
    fn input_name(&self) -> &str {
        self.input.name()
    }

    #[getter]
    fn output_names(&self) -> Vec<String> {
        self.outputs.clone()
    }

    /// Labels on the input port as `(id, data, index, width)` tuples.
    fn labels<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let labels = PyList::empty_bound(py);
        for label in self.input.labels() {
            let data = self.env.object_to_py(py, &label.data).map_err(raise)?;
            let entry = PyTuple::new_bound(
                py,
                [
                    label.id.to_object(py),
                    data.unbind(),
                    label.index.to_object(py),
                    label.width.to_object(py),
                ],
            );
            labels.append(entry)?;
        }
        Ok(labels)
    }

    /// Post a label to the output port named `output`.
    #[pyo3(signature = (output, id, data, index, width = 1))]
    fn post(
        &mut self,
        output: &str,
        id: String,
        data: &Bound<'_, PyAny>,
        index: u64,
        width: u64,
    ) -> PyResult<()> {
        if self.closed {
            return Err(PyRuntimeError::new_err(
                "ports are only usable inside propagateLabels",
            ));
        }
        let position = self
            .outputs
            .iter()
            .position(|name| name == output)
            .ok_or_else(|| PyKeyError::new_err(format!("no output port {}", output)))?;
        let data = self.env.py_to_object_lenient(data).map_err(raise)?;
        self.posted.push((
            position,
            Label {
                id,
                data,
                index,
                width,
            },
        ));
        Ok(())
    }

    fn __repr__(&self) -> String {
        format!("Ports({} -> {})", self.input.name(), self.outputs.join(", "))
    }
}
